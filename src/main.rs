fn main() -> anyhow::Result<()> {
    tabbed_journal::cli::run()
}
