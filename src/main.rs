//! mixeddrinks - command line front end for the mixed drinks store

use mixeddrinks::core::{self, services, CliArgs, Command, DrinkError, DrinkService};
use mixeddrinks::db::{self, DrinkId, IngredientId};

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let config = match core::Config::load(&args) {
        Ok(cfg) => cfg,
        Err(e) => {
            // Logging isn't initialized yet
            eprintln!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let _logger = core::Logger::init(&config.logging)?;

    if let Err(e) = run(args, &config).await {
        match e.downcast_ref::<DrinkError>() {
            Some(err) => error!(error = %err, error_type = err.error_type(), "Command failed"),
            None => error!(error = %e, "Command failed"),
        }
        return Err(e);
    }

    Ok(())
}

async fn run(args: CliArgs, config: &core::Config) -> Result<()> {
    info!(url = %config.database.url, "Connecting to database");
    let db = Arc::new(db::DatabaseManager::connect(
        &config.database.url,
        config.database.connection_pool_size,
        Duration::from_millis(config.database.busy_timeout),
    )?);

    let service = DrinkService::new(db.clone());

    match args.command {
        Command::Init => {
            db.migrate()?;
            println!("schema ready");
        }
        Command::Reset => {
            db.reset()?;
            println!("schema recreated");
        }
        Command::AddDrink { name, ingredients } => {
            let recipe = service.mix_drink(&name, ingredients).await?;
            if args.json {
                print_json(&recipe)?;
            } else {
                println!("{}", recipe.drink);
                print_list(&recipe.components);
            }
        }
        Command::AddIngredient { name } => {
            let ingredient = service.add_ingredient(&name).await?;
            print_one(args.json, &ingredient)?;
        }
        Command::Attach {
            drink_id,
            ingredient_id,
        } => {
            let link = service
                .attach(DrinkId(drink_id), IngredientId(ingredient_id))
                .await?;
            print_one(args.json, &link)?;
        }
        Command::Components { drink_id } => {
            let recipe = service.recipe(DrinkId(drink_id)).await?;
            if args.json {
                print_json(&recipe.components)?;
            } else {
                print_list(&recipe.components);
            }
        }
        Command::Libations { ingredient_id } => {
            let usage = service.usage(IngredientId(ingredient_id)).await?;
            if args.json {
                print_json(&usage.libations)?;
            } else {
                print_list(&usage.libations);
            }
        }
        Command::List => {
            let menu = service.menu().await?;
            if args.json {
                print_json(&menu)?;
            } else {
                for recipe in &menu {
                    println!("{}", recipe.drink);
                    print_list(&recipe.components);
                }
            }
        }
        Command::Demo => {
            // Never wipe the configured store for a demo
            let scratch = db::DatabaseManager::new_in_memory()?;
            for line in services::demo(&scratch).await? {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

fn print_one<T: Serialize + Display>(json: bool, value: &T) -> Result<()> {
    if json {
        print_json(value)
    } else {
        println!("{}", value);
        Ok(())
    }
}

fn print_list<T: Display>(items: &[T]) {
    for item in items {
        println!("  {}", item);
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
