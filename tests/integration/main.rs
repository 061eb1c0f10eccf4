//! Integration tests for kiln

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn kiln() -> Command {
        let mut cmd = cargo_bin_cmd!("kiln");
        cmd.env_remove("KILN_CONFIG").env_remove("KILN_WORKSPACE");
        cmd
    }

    /// A project with a recipe, an index directory and a workspace
    struct Project {
        temp: TempDir,
    }

    impl Project {
        fn new(recipe: &str) -> Self {
            let temp = TempDir::new().unwrap();
            std::fs::create_dir_all(temp.path().join("src")).unwrap();
            std::fs::write(temp.path().join("src").join("kiln.toml"), recipe).unwrap();
            std::fs::create_dir_all(temp.path().join("index")).unwrap();
            Self { temp }
        }

        fn package(self, name: &str, version: &str, requires: &[&str]) -> Self {
            let dir = self.temp.path().join("index").join(name).join(version);
            std::fs::create_dir_all(&dir).unwrap();
            let requires: Vec<String> = requires.iter().map(|r| format!("\"{}\"", r)).collect();
            std::fs::write(
                dir.join("package.toml"),
                format!(
                    "[package]\nname = \"{}\"\nversion = \"{}\"\nrequires = [{}]\n",
                    name,
                    version,
                    requires.join(", ")
                ),
            )
            .unwrap();
            self
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.temp.path().join(rel)
        }

        fn config(&self, content: &str) -> PathBuf {
            let path = self.path("config.toml");
            std::fs::write(&path, content).unwrap();
            path
        }

        /// kiln <command> with recipe, index and workspace pointing into the project
        fn cmd(&self, command: &str) -> Command {
            let mut cmd = kiln();
            cmd.current_dir(self.temp.path())
                .arg("--no-local")
                .arg("--config")
                .arg(self.path("missing-config.toml"))
                .arg(command)
                .arg("--recipe")
                .arg(self.path("src"))
                .arg("--index")
                .arg(self.path("index"))
                .arg("--workspace")
                .arg(self.path("ws"));
            cmd
        }
    }

    const APP_RECIPE: &str = r#"[recipe]
name = "app"
version = "1.0"
settings = ["build_type"]
requires = ["fmt>=10.0,<11.0"]
"#;

    #[test]
    fn help_displays() {
        kiln()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Package-recipe build orchestrator"));
    }

    #[test]
    fn version_displays() {
        kiln()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("kiln"));
    }

    #[test]
    fn completions_for_bash() {
        kiln()
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("kiln"));
    }

    #[test]
    fn init_creates_recipe() {
        let temp = TempDir::new().unwrap();
        kiln()
            .args(["init", "--name", "myproject", "--path"])
            .arg(temp.path())
            .assert()
            .success();

        let content = std::fs::read_to_string(temp.path().join("kiln.toml")).unwrap();
        assert!(content.contains("name = \"myproject\""));
    }

    #[test]
    fn init_refuses_existing_recipe() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("kiln.toml"), "keep me").unwrap();
        kiln()
            .args(["init", "--name", "myproject", "--path"])
            .arg(temp.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));
        assert_eq!(std::fs::read_to_string(temp.path().join("kiln.toml")).unwrap(), "keep me");
    }

    #[test]
    fn config_path_and_show() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.toml");

        kiln()
            .arg("--no-local")
            .arg("--config")
            .arg(&config)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));

        kiln()
            .arg("--no-local")
            .arg("--config")
            .arg(&config)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[general]"));
    }

    #[test]
    fn config_set_then_show() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.toml");

        kiln()
            .arg("--no-local")
            .arg("--config")
            .arg(&config)
            .args(["config", "set", "cmake.generator", "Ninja"])
            .assert()
            .success();

        kiln()
            .arg("--no-local")
            .arg("--config")
            .arg(&config)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("generator = \"Ninja\""));

        kiln()
            .arg("--no-local")
            .arg("--config")
            .arg(&config)
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn resolve_json_picks_highest_version() {
        let project = Project::new(APP_RECIPE)
            .package("fmt", "10.1.0", &[])
            .package("fmt", "10.2.0", &[])
            .package("fmt", "11.0.0", &[]);

        let output = project
            .cmd("resolve")
            .args(["-s", "build_type=Release", "--format", "json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["recipe"], "app/1.0");
        assert_eq!(value["packages"][0]["name"], "fmt");
        assert_eq!(value["packages"][0]["version"], "10.2.0");
    }

    #[test]
    fn resolve_table_lists_packages() {
        let project = Project::new(APP_RECIPE).package("fmt", "10.2.0", &[]);
        project
            .cmd("resolve")
            .args(["-s", "build_type=Debug"])
            .assert()
            .success()
            .stdout(predicate::str::contains("fmt").and(predicate::str::contains("10.2.0")));
    }

    #[test]
    fn missing_recipe_exits_2() {
        let project = Project::new(APP_RECIPE);
        std::fs::remove_file(project.path("src").join("kiln.toml")).unwrap();
        project
            .cmd("resolve")
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Recipe not found"));
    }

    #[test]
    fn invalid_setting_exits_2() {
        let project = Project::new(APP_RECIPE).package("fmt", "10.2.0", &[]);
        project
            .cmd("resolve")
            .args(["-s", "build_type=Fastest"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("build_type"));
    }

    #[test]
    fn missing_setting_exits_2() {
        let project = Project::new(APP_RECIPE).package("fmt", "10.2.0", &[]);
        project.cmd("resolve").assert().code(2);
    }

    #[test]
    fn version_conflict_exits_3() {
        let recipe = r#"[recipe]
name = "app"
version = "1.0"
requires = ["x>=2.0", "y"]
"#;
        let project = Project::new(recipe)
            .package("x", "1.5.0", &[])
            .package("x", "2.1.0", &[])
            .package("y", "1.0.0", &["x<2.0"]);

        project
            .cmd("resolve")
            .assert()
            .code(3)
            .stderr(predicate::str::contains("Version conflict for 'x'"));
    }

    #[test]
    fn unknown_package_exits_3() {
        let project = Project::new(APP_RECIPE);
        project
            .cmd("resolve")
            .args(["-s", "build_type=Release"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("fmt"));
    }

    #[test]
    fn generate_without_requirements_writes_toolchain() {
        let recipe = "[recipe]\nname = \"app\"\nversion = \"1.0\"\nsettings = [\"build_type\"]\n";
        let project = Project::new(recipe);
        project
            .cmd("generate")
            .args(["-s", "build_type=Release"])
            .assert()
            .success()
            .stdout(predicate::str::contains("kiln_toolchain.cmake"));

        assert!(find_file(&project.path("ws"), "kiln_toolchain.cmake"));
    }

    #[test]
    fn generate_with_uninstalled_package_exits_5() {
        let project = Project::new(APP_RECIPE).package("fmt", "10.2.0", &[]);
        project
            .cmd("generate")
            .args(["-s", "build_type=Release"])
            .assert()
            .code(5)
            .stderr(predicate::str::contains("not installed"));
    }

    #[test]
    fn build_without_cmake_exits_6() {
        let recipe = "[recipe]\nname = \"app\"\nversion = \"1.0\"\n";
        let project = Project::new(recipe);
        let config = project.config("[cmake]\nprogram = \"kiln-test-no-such-cmake\"\n");

        kiln()
            .current_dir(project.path(""))
            .arg("--no-local")
            .arg("--config")
            .arg(&config)
            .arg("build")
            .arg("--recipe")
            .arg(project.path("src"))
            .arg("--workspace")
            .arg(project.path("ws"))
            .assert()
            .code(6)
            .stderr(predicate::str::contains("kiln-test-no-such-cmake"));
    }

    #[test]
    fn profile_from_config_supplies_settings() {
        let project = Project::new(APP_RECIPE).package("fmt", "10.2.0", &[]);
        let config = project.config("[profiles.debug]\nbuild_type = \"Debug\"\n");

        kiln()
            .current_dir(project.path(""))
            .arg("--no-local")
            .arg("--config")
            .arg(&config)
            .args(["resolve", "--profile", "debug", "--format", "json", "--recipe"])
            .arg(project.path("src"))
            .arg("--index")
            .arg(project.path("index"))
            .assert()
            .success()
            .stdout(predicate::str::contains("\"build_type\": \"Debug\""));

        kiln()
            .current_dir(project.path(""))
            .arg("--no-local")
            .arg("--config")
            .arg(&config)
            .args(["resolve", "--profile", "nope", "--recipe"])
            .arg(project.path("src"))
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Unknown settings profile"));
    }

    fn find_file(dir: &Path, name: &str) -> bool {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return false;
        };
        entries.flatten().any(|entry| {
            let path = entry.path();
            if path.is_dir() {
                find_file(&path, name)
            } else {
                path.file_name().is_some_and(|n| n == name)
            }
        })
    }
}
