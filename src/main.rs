fn main() -> anyhow::Result<()> {
    loopjam::entry::run_app()
}
