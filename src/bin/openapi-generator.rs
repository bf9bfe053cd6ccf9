use killer_rounds_back::services::documentation::ApiDoc;
use utoipa::OpenApi;

/// Print the OpenAPI document so it can be committed or fed to client generators.
fn main() -> serde_json::Result<()> {
    println!("{}", ApiDoc::openapi().to_pretty_json()?);
    Ok(())
}
