//! Init command - create a kiln.toml recipe

use crate::cli::args::InitArgs;
use crate::error::{KilnError, KilnResult};
use crate::recipe::{validate_package_name, Recipe, RECIPE_FILE};
use crate::ui::{self, UiContext};
use std::path::Path;
use tokio::fs;

/// Template for a new recipe
const INIT_TEMPLATE: &str = r#"# kiln recipe
# Settings axes: os, compiler (implies compiler.version), compiler.libcxx,
# build_type, arch

[recipe]
name = "{name}"
version = "{version}"
settings = ["os", "compiler", "build_type", "arch"]
requires = [
    # "fmt>=10.0,<11.0",
]
# exports_sources = ["CMakeLists.txt", "src/*"]
"#;

/// Execute the init command
pub async fn execute(args: InitArgs) -> KilnResult<()> {
    let ctx = UiContext::detect().with_auto_yes(args.yes);
    init_in(&ctx, args).await
}

async fn init_in(ctx: &UiContext, args: InitArgs) -> KilnResult<()> {
    let target_dir = match args.path {
        Some(ref p) => p.clone(),
        None => {
            std::env::current_dir().map_err(|e| KilnError::io("getting current directory", e))?
        }
    };

    let name = match args.name {
        Some(name) => name,
        None => default_name(&target_dir)?,
    };
    validate_package_name(&name).map_err(KilnError::User)?;

    let recipe_path = target_dir.join(RECIPE_FILE);
    if recipe_path.exists() && !args.force {
        let overwrite = ui::confirm(
            ctx,
            &format!("{} already exists. Overwrite?", recipe_path.display()),
            false,
        )
        .await?;
        if !overwrite {
            return Err(KilnError::User(format!(
                "{} already exists. Use --force to overwrite.",
                recipe_path.display()
            )));
        }
    }

    let content = render_template(&name, &args.recipe_version);
    // Never write a recipe we could not load back
    Recipe::parse(&content, &target_dir).map_err(|reason| KilnError::RecipeInvalid {
        path: recipe_path.clone(),
        reason,
    })?;

    ensure_dir(&target_dir).await?;
    fs::write(&recipe_path, content)
        .await
        .map_err(|e| KilnError::io(format!("writing {}", recipe_path.display()), e))?;

    ui::step_ok_detail(
        ctx,
        &format!("Created recipe {}/{}", name, args.recipe_version),
        &recipe_path.display().to_string(),
    );

    Ok(())
}

fn render_template(name: &str, version: &str) -> String {
    INIT_TEMPLATE
        .replace("{name}", name)
        .replace("{version}", version)
}

/// Directory name, lowercased, with spaces turned into dashes
fn default_name(dir: &Path) -> KilnResult<String> {
    let absolute = std::path::absolute(dir)
        .map_err(|e| KilnError::io(format!("resolving {}", dir.display()), e))?;
    absolute
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.trim().to_lowercase().replace(' ', "-"))
        .filter(|n| !n.is_empty())
        .ok_or_else(|| KilnError::User("cannot derive a recipe name; pass --name".to_string()))
}

async fn ensure_dir(dir: &Path) -> KilnResult<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| KilnError::io(format!("creating directory {}", dir.display()), e))?;
    }
    Ok(())
}
