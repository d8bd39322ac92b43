use clap::{Parser, Subcommand};
use foodgram::models::{Ingredient, RecipeRead, RecipeShort, Tag};
use foodgram::pagination::Page;
use foodgram::user_models::{TokenLoginResponse, UserResponse};
use prettytable::{Cell, Row, Table};
use reqwest::StatusCode;
use serde_json::json;
use std::fs;
use std::path::Path;

const API_URL: &str = "http://localhost:3000";
const SESSION_FILE: &str = ".session";

#[derive(Parser)]
#[command(name = "foodgram")]
#[command(about = "A CLI client for the Foodgram API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create a new user account")]
    Signup {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        first_name: String,
        #[arg(short, long)]
        last_name: String,
        #[arg(short, long)]
        password: String,
    },

    #[command(about = "Log in and store the auth token")]
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },

    #[command(about = "Log out and drop the stored token")]
    Logout,

    #[command(about = "Show the current user")]
    Whoami,

    #[command(about = "List tags")]
    Tags,

    #[command(about = "List ingredients, optionally filtered by name prefix")]
    Ingredients {
        #[arg(short, long)]
        name: Option<String>,
    },

    #[command(about = "List recipes")]
    Recipes {
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },

    #[command(about = "Add a recipe to favorites")]
    Favorite {
        #[arg(short, long)]
        recipe_id: String,
    },

    #[command(about = "Remove a recipe from favorites")]
    Unfavorite {
        #[arg(short, long)]
        recipe_id: String,
    },

    #[command(about = "Add a recipe to the shopping cart")]
    CartAdd {
        #[arg(short, long)]
        recipe_id: String,
    },

    #[command(about = "Remove a recipe from the shopping cart")]
    CartRemove {
        #[arg(short, long)]
        recipe_id: String,
    },

    #[command(about = "Subscribe to an author")]
    Subscribe {
        #[arg(short, long)]
        user_id: String,
    },

    #[command(about = "Unsubscribe from an author")]
    Unsubscribe {
        #[arg(short, long)]
        user_id: String,
    },

    #[command(about = "Download the aggregated shopping list")]
    ShoppingList,
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Signup {
            email,
            username,
            first_name,
            last_name,
            password,
        } => signup(email, username, first_name, last_name, password).await,
        Commands::Login { email, password } => login(email, password).await,
        Commands::Logout => logout().await,
        Commands::Whoami => whoami().await,
        Commands::Tags => tags().await,
        Commands::Ingredients { name } => ingredients(name).await,
        Commands::Recipes { page } => recipes(page).await,
        Commands::Favorite { recipe_id } => {
            toggle_post(&format!("recipes/{recipe_id}/favorite/"), "Added to favorites").await
        }
        Commands::Unfavorite { recipe_id } => {
            toggle_delete(&format!("recipes/{recipe_id}/favorite/"), "Removed from favorites")
                .await
        }
        Commands::CartAdd { recipe_id } => {
            toggle_post(
                &format!("recipes/{recipe_id}/shopping_cart/"),
                "Added to the shopping cart",
            )
            .await
        }
        Commands::CartRemove { recipe_id } => {
            toggle_delete(
                &format!("recipes/{recipe_id}/shopping_cart/"),
                "Removed from the shopping cart",
            )
            .await
        }
        Commands::Subscribe { user_id } => {
            toggle_post(&format!("users/{user_id}/subscribe/"), "Subscribed").await
        }
        Commands::Unsubscribe { user_id } => {
            toggle_delete(&format!("users/{user_id}/subscribe/"), "Unsubscribed").await
        }
        Commands::ShoppingList => shopping_list().await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Abbreviate an id for table display. Falls back to the full id when it
/// is short or cut on a non-ASCII boundary.
fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn save_session(token: &str) -> CliResult {
    fs::write(SESSION_FILE, token)?;
    Ok(())
}

fn load_session() -> Option<String> {
    if Path::new(SESSION_FILE).exists() {
        fs::read_to_string(SESSION_FILE)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    } else {
        None
    }
}

fn authed(builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match load_session() {
        Some(token) => builder.header("Authorization", format!("Token {token}")),
        None => builder,
    }
}

async fn fail_with_body(response: reqwest::Response, action: &str) -> CliResult {
    let error_text = response.text().await?;
    Err(format!("Failed to {}: {}", action, error_text).into())
}

async fn signup(
    email: String,
    username: String,
    first_name: String,
    last_name: String,
    password: String,
) -> CliResult {
    let client = reqwest::Client::new();
    let payload = json!({
        "email": email,
        "username": username,
        "first_name": first_name,
        "last_name": last_name,
        "password": password,
    });

    let response = client
        .post(format!("{}/api/users/", API_URL))
        .json(&payload)
        .send()
        .await?;

    if !response.status().is_success() {
        return fail_with_body(response, "sign up").await;
    }

    let user: UserResponse = response.json().await?;
    println!("✅ Account created for {} ({})", user.username, user.email);
    println!("   ID: {}", user.id);
    Ok(())
}

async fn login(email: String, password: String) -> CliResult {
    let client = reqwest::Client::new();
    let payload = json!({ "email": email, "password": password });

    let response = client
        .post(format!("{}/api/auth/token/login/", API_URL))
        .json(&payload)
        .send()
        .await?;

    if !response.status().is_success() {
        return fail_with_body(response, "log in").await;
    }

    let token: TokenLoginResponse = response.json().await?;
    save_session(&token.auth_token)?;
    println!("✅ Logged in as {}", email);
    Ok(())
}

async fn logout() -> CliResult {
    let client = reqwest::Client::new();
    let response = authed(client.post(format!("{}/api/auth/token/logout/", API_URL)))
        .send()
        .await?;

    if !response.status().is_success() && response.status() != StatusCode::UNAUTHORIZED {
        return fail_with_body(response, "log out").await;
    }

    if Path::new(SESSION_FILE).exists() {
        fs::remove_file(SESSION_FILE)?;
    }
    println!("✅ Logged out");
    Ok(())
}

async fn whoami() -> CliResult {
    let client = reqwest::Client::new();
    let response = authed(client.get(format!("{}/api/users/me/", API_URL)))
        .send()
        .await?;

    if !response.status().is_success() {
        return fail_with_body(response, "fetch current user").await;
    }

    let user: UserResponse = response.json().await?;
    println!("👤 {} {} ({})", user.first_name, user.last_name, user.username);
    println!("   Email: {}", user.email);
    println!("   ID: {}", user.id);
    Ok(())
}

async fn tags() -> CliResult {
    let client = reqwest::Client::new();
    let response = client.get(format!("{}/api/tags/", API_URL)).send().await?;

    if !response.status().is_success() {
        return fail_with_body(response, "fetch tags").await;
    }

    let tags: Vec<Tag> = response.json().await?;
    if tags.is_empty() {
        println!("📭 No tags found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("ID"),
        Cell::new("Name"),
        Cell::new("Color"),
        Cell::new("Slug"),
    ]));
    for tag in tags {
        table.add_row(Row::new(vec![
            Cell::new(short_id(&tag.id)),
            Cell::new(&tag.name),
            Cell::new(&tag.color),
            Cell::new(&tag.slug),
        ]));
    }
    table.printstd();
    Ok(())
}

async fn ingredients(name: Option<String>) -> CliResult {
    let client = reqwest::Client::new();
    let mut request = client.get(format!("{}/api/ingredients/", API_URL));
    if let Some(name) = name {
        request = request.query(&[("name", name)]);
    }
    let response = request.send().await?;

    if !response.status().is_success() {
        return fail_with_body(response, "fetch ingredients").await;
    }

    let ingredients: Vec<Ingredient> = response.json().await?;
    if ingredients.is_empty() {
        println!("📭 No ingredients found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("ID"),
        Cell::new("Name"),
        Cell::new("Unit"),
    ]));
    for ingredient in ingredients {
        table.add_row(Row::new(vec![
            Cell::new(short_id(&ingredient.id)),
            Cell::new(&ingredient.name),
            Cell::new(&ingredient.measurement_unit),
        ]));
    }
    table.printstd();
    Ok(())
}

async fn recipes(page: usize) -> CliResult {
    let client = reqwest::Client::new();
    let response = authed(client.get(format!("{}/api/recipes/", API_URL)))
        .query(&[("page", page.to_string())])
        .send()
        .await?;

    if !response.status().is_success() {
        return fail_with_body(response, "fetch recipes").await;
    }

    let result: Page<RecipeRead> = response.json().await?;
    if result.results.is_empty() {
        println!("📭 No recipes found.");
        return Ok(());
    }

    println!("\n📋 Recipes (page {}, {} total)\n", page, result.count);

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("ID"),
        Cell::new("Name"),
        Cell::new("Author"),
        Cell::new("Minutes"),
        Cell::new("Tags"),
    ]));
    for recipe in result.results {
        let tags = recipe
            .tags
            .iter()
            .map(|t| t.slug.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(Row::new(vec![
            Cell::new(short_id(&recipe.id)),
            Cell::new(&recipe.name),
            Cell::new(&recipe.author.username),
            Cell::new(&recipe.cooking_time.to_string()),
            Cell::new(&tags),
        ]));
    }
    table.printstd();
    println!();
    Ok(())
}

async fn toggle_post(path: &str, success: &str) -> CliResult {
    let client = reqwest::Client::new();
    let response = authed(client.post(format!("{}/api/{}", API_URL, path)))
        .send()
        .await?;

    if !response.status().is_success() {
        return fail_with_body(response, "apply the change").await;
    }

    // Subscribe and favorite/cart both answer with a small JSON body
    if let Ok(recipe) = response.json::<RecipeShort>().await {
        println!("✅ {}: {}", success, recipe.name);
    } else {
        println!("✅ {}", success);
    }
    Ok(())
}

async fn toggle_delete(path: &str, success: &str) -> CliResult {
    let client = reqwest::Client::new();
    let response = authed(client.delete(format!("{}/api/{}", API_URL, path)))
        .send()
        .await?;

    if !response.status().is_success() {
        return fail_with_body(response, "apply the change").await;
    }
    println!("✅ {}", success);
    Ok(())
}

async fn shopping_list() -> CliResult {
    let client = reqwest::Client::new();
    let response = authed(client.get(format!(
        "{}/api/recipes/download_shopping_cart/",
        API_URL
    )))
    .send()
    .await?;

    if !response.status().is_success() {
        return fail_with_body(response, "download the shopping list").await;
    }

    let text = response.text().await?;
    println!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::short_id;

    #[test]
    fn long_id_is_truncated() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
    }

    #[test]
    fn short_id_is_kept_whole() {
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn multibyte_boundary_does_not_panic() {
        assert_eq!(short_id("суп-харчо"), "суп-харчо");
    }
}
