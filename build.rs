fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/robonav.proto");

    #[cfg(feature = "grpc")]
    tonic_prost_build::compile_protos("proto/robonav.proto")?;

    Ok(())
}
