fn main() -> anyhow::Result<()> {
    fx_dashboard_lib::run()
}
