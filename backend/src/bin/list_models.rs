//! Prints the language models the configured `GEMINI_API_KEY` can use for
//! content generation.

use std::process::ExitCode;

use neuroscan::assistant::gemini::GeminiClient;
use neuroscan::config::AppConfig;

#[actix_web::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let Some(gemini) = config.gemini else {
        eprintln!("Error: GEMINI_API_KEY not found in environment variables.");
        return ExitCode::FAILURE;
    };

    let client = match GeminiClient::new(&gemini) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error configuring client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Fetching available Gemini models...");
    println!("{}", "-".repeat(50));

    let models = match client.list_models().await {
        Ok(models) => models,
        Err(e) => {
            eprintln!("Error listing models: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut found = false;
    for model in models.iter().filter(|model| model.supports_generation()) {
        println!("Model Name: {}", model.name);
        println!("Display Name: {}", model.display_name.as_deref().unwrap_or("-"));
        println!("Description: {}", model.description.as_deref().unwrap_or("-"));
        println!("{}", "-".repeat(50));
        found = true;
    }

    if !found {
        println!("No models found that support content generation.");
    }
    ExitCode::SUCCESS
}
