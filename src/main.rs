fn main() -> anyhow::Result<()> {
    parley::init_tracing();
    parley::run()?;
    Ok(())
}
