// src/cli.rs

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::{Connection, LocalDirectory};
use crate::config::{AppConfig, BackendConfig, LocalConfig};
use crate::engine::Reconciler;
use crate::models::User;
use crate::raddb::RadDB;
use crate::snapshot::Snapshot;
use crate::web::run_web_server;

// === CLI ===

#[derive(Parser)]
#[command(name = "nextdomen-sync")]
#[command(
    author,
    version,
    about = "Синхронизация пользователей, групп и OU Active Directory",
    long_about = None
)]
pub struct Cli {
    /// Путь к config.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand)]
pub enum Command {
    /// Пользователи: Pull / Push
    User {
        #[command(subcommand)]
        cmd: UserCommand,
    },
    /// Группы
    Group {
        #[command(subcommand)]
        cmd: LookupCommand,
    },
    /// Организационные подразделения (OU)
    Ou {
        #[command(subcommand)]
        cmd: LookupCommand,
    },
    /// Произвольные объекты каталога
    Object {
        #[command(subcommand)]
        cmd: LookupCommand,
    },
    /// Проверить подключение к каталогу
    Check,
    /// Создать config.yaml с локальным каталогом и новым мастер-ключом
    Init {
        #[arg(default_value = "config.yaml")]
        path: PathBuf,
        /// Перезаписать существующий файл
        #[arg(long)]
        force: bool,
    },
    /// Запустить REST API
    Serve {
        /// Адрес (по умолчанию из конфигурации)
        #[arg(long)]
        addr: Option<String>,
    },
    /// Наполнение локального каталога
    Local {
        #[command(subcommand)]
        cmd: LocalCommand,
    },
}

// === Подкоманды ===

#[derive(clap::Subcommand)]
pub enum UserCommand {
    /// Прочитать пользователя в YAML-снимок
    Get {
        identity: String,
        /// Записать снимок в файл вместо stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Применить YAML-снимок; файл перезаписывается после успеха
    Push { file: PathBuf },
    /// Есть ли пользователь с таким значением атрибута
    Exists {
        #[arg(long, default_value = "Name")]
        attribute: String,
        value: String,
    },
}

#[derive(clap::Subcommand)]
pub enum LookupCommand {
    Get { identity: String },
}

#[derive(clap::Subcommand)]
pub enum LocalCommand {
    /// Создать группу
    AddGroup {
        name: String,
        #[arg(long)]
        sam: Option<String>,
        /// DN контейнера (по умолчанию контейнер пользователей)
        #[arg(long)]
        container: Option<String>,
    },
    /// Создать OU
    AddOu {
        name: String,
        /// DN родителя
        #[arg(long)]
        parent: String,
    },
}

/// Выполнить команду с уже загруженной конфигурацией
pub async fn run(cli: Cli, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Command::Init { path, force } = &cli.command {
        return init_config(path, *force);
    }

    let connection = Connection::open(&config.backend)?;
    let engine = Arc::new(Reconciler::new(connection.backend()));

    match cli.command {
        Command::User { cmd } => handle_user(cmd, &engine).await?,
        Command::Group { cmd: LookupCommand::Get { identity } } => {
            let snapshot = engine.pull_group_by_identity(&identity).await?;
            print!("{}", serde_yaml::to_string(&snapshot)?);
        }
        Command::Ou { cmd: LookupCommand::Get { identity } } => {
            let org_unit = engine.pull_org_unit_by_identity(&identity).await?;
            print!("{}", serde_yaml::to_string(&org_unit)?);
        }
        Command::Object { cmd: LookupCommand::Get { identity } } => {
            let object = engine.backend().fetch_object(&identity).await?;
            print!("{}", serde_yaml::to_string(&object)?);
        }
        Command::Check => match engine.backend().test_connection().await {
            Ok(()) => println!("✅ Каталог доступен"),
            Err(e) => {
                eprintln!("❌ Каталог недоступен: {}", e);
                return Err(e.into());
            }
        },
        // Обработано до подключения
        Command::Init { .. } => {}
        Command::Serve { addr } => {
            let addr = addr.unwrap_or(config.web_server.address);
            run_web_server(engine, &addr).await?;
        }
        Command::Local { cmd } => match connection.local() {
            Some(directory) => handle_local(cmd, directory).await?,
            None => {
                let message =
                    "Команда доступна только для локального каталога (backend.kind: local)";
                eprintln!("❌ {}", message);
                return Err(message.into());
            }
        },
    }

    Ok(())
}

// === Обработчики ===

fn init_config(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        let message = format!("Файл уже существует: {} (используйте --force)", path.display());
        eprintln!("❌ {}", message);
        return Err(message.into());
    }

    let local = LocalConfig {
        master_key_hex: Some(hex::encode(RadDB::generate_key())),
        ..LocalConfig::default()
    };
    let config = AppConfig {
        backend: BackendConfig::Local(local),
        ..AppConfig::default()
    };
    config.save(path)?;

    println!("✅ Конфигурация создана: {}", path.display());
    println!("⚠️  Файл содержит мастер-ключ локального каталога, храните его в тайне");
    Ok(())
}

async fn handle_user(
    cmd: UserCommand,
    engine: &Reconciler,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        UserCommand::Get { identity, out } => {
            let snapshot = engine.pull_user_by_identity(&identity).await?;
            let yaml = serde_yaml::to_string(&snapshot)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, yaml)?;
                    println!("✅ Снимок сохранён: {}", path.display());
                }
                None => print!("{}", yaml),
            }
        }
        UserCommand::Push { file } => {
            let content = std::fs::read_to_string(&file)?;
            let mut snapshot: Snapshot<User> = serde_yaml::from_str(&content)?;

            engine.push_user(&mut snapshot).await?;

            std::fs::write(&file, serde_yaml::to_string(&snapshot)?)?;
            println!("✅ Пользователь синхронизирован: {}", snapshot.desired.base.name);
        }
        UserCommand::Exists { attribute, value } => {
            if engine.backend().exists_by_attribute(&attribute, &value).await? {
                println!("✅ Найден пользователь с {} = {}", attribute, value);
            } else {
                println!("❌ Пользователь с {} = {} не найден", attribute, value);
            }
        }
    }
    Ok(())
}

async fn handle_local(
    cmd: LocalCommand,
    directory: &LocalDirectory,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        LocalCommand::AddGroup { name, sam, container } => {
            let group = directory
                .add_group(&name, sam.as_deref(), container.as_deref())
                .await?;
            println!("✅ Группа создана: DN={}", group.base.distinguished_name);
        }
        LocalCommand::AddOu { name, parent } => {
            let ou = directory.add_org_unit(&name, &parent).await?;
            println!("✅ OU создана: DN={}", ou.base.distinguished_name);
        }
    }
    Ok(())
}
