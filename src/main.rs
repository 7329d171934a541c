use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match reseta_lib::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("reseta: {e}");
            ExitCode::FAILURE
        }
    }
}
