use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    std::fs::create_dir_all("src/generated")?;

    tonic_build::configure()
        .out_dir("src/generated")
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/auth.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/auth.proto");
    Ok(())
}
