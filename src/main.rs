fn main() -> anyhow::Result<()> {
    three_d_viewer::run()
}
