fn main() -> anyhow::Result<()> {
    fridge_vision_lib::run()
}
