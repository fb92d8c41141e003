fn main() -> anyhow::Result<()> {
    builder::run()
}
