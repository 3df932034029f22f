fn main() {
    // grammar files under src/ compile to the same relative path in OUT_DIR
    lalrpop::Configuration::new()
        .use_cargo_dir_conventions()
        .process()
        .expect("LaTeX grammar should compile");
}
