use crate::cli::CommonArgs;
use crate::config::{ProfilesConfig, ProjectConfig};
use anyhow::Context as _;
use pgctx::{
    ContextDataFetcher, EntityId, MemoryProfileStore, PgProfileStore,
    ProfileStore, SchemaCatalog,
};
use std::path::Path;
use std::sync::Arc;
use tokio_postgres::{Client, NoTls};

/// Everything a command needs: config, catalog, profiles and maybe a connection.
pub struct Workspace {
    pub project: ProjectConfig,
    pub catalog: Arc<SchemaCatalog>,
    profiles: Profiles,
    client: Option<Arc<Client>>,
}

enum Profiles {
    File(Arc<MemoryProfileStore>),
    Table(Arc<dyn ProfileStore>),
}

impl Workspace {
    /// Load the project. A connection is opened when `connect` is set or when
    /// profiles are read from a table.
    pub async fn open(common: &CommonArgs, connect: bool) -> anyhow::Result<Self> {
        let project = ProjectConfig::load(&common.config)?;
        let catalog = load_catalog(&project.resolve_path(&project.file.catalog))?;
        tracing::debug!(entities = catalog.len(), "catalog loaded");

        let table = project.file.profiles.table.clone();
        let client = if connect || reads_profile_table(&project.file.profiles) {
            let url = project
                .database_url(common.database.as_deref())
                .context("no database configured; set database.url or pass --database")?;
            Some(Arc::new(connect_db(&url).await?))
        } else {
            None
        };

        let profiles = match (&project.file.profiles.file, table, &client) {
            (Some(file), _, _) => {
                let path = project.resolve_path(file);
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read profiles {}", path.display()))?;
                let store = MemoryProfileStore::from_json(&raw)
                    .with_context(|| format!("failed to parse profiles {}", path.display()))?;
                Profiles::File(Arc::new(store))
            }
            (None, Some(table), Some(client)) => {
                Profiles::Table(Arc::new(PgProfileStore::with_table(Arc::clone(client), &table)?))
            }
            _ => anyhow::bail!("no profile source configured"),
        };

        Ok(Self {
            project,
            catalog: Arc::new(catalog),
            profiles,
            client,
        })
    }

    pub fn fetcher(&self) -> ContextDataFetcher {
        let store: Arc<dyn ProfileStore> = match &self.profiles {
            Profiles::File(store) => Arc::clone(store) as Arc<dyn ProfileStore>,
            Profiles::Table(store) => Arc::clone(store),
        };
        ContextDataFetcher::with_config(
            Arc::clone(&self.catalog),
            store,
            self.project.file.fetcher_config(),
        )
    }

    /// Names of file-backed profiles; `None` when profiles live in a table.
    pub fn profile_names(&self) -> Option<Vec<String>> {
        match &self.profiles {
            Profiles::File(store) => Some(store.names()),
            Profiles::Table(_) => None,
        }
    }

    pub fn client(&self) -> anyhow::Result<&Client> {
        self.client
            .as_deref()
            .context("this command needs a database connection")
    }
}

/// A profile file takes precedence over a profile table.
fn reads_profile_table(profiles: &ProfilesConfig) -> bool {
    profiles.file.is_none() && profiles.table.is_some()
}

fn load_catalog(path: &Path) -> anyhow::Result<SchemaCatalog> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    let catalog = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&raw)
            .with_context(|| format!("failed to parse catalog {}", path.display()))?,
        _ => SchemaCatalog::from_json(&raw)
            .with_context(|| format!("failed to parse catalog {}", path.display()))?,
    };
    Ok(catalog)
}

pub async fn connect_db(database_url: &str) -> anyhow::Result<Client> {
    let (client, connection) = tokio_postgres::connect(database_url, NoTls)
        .await
        .context("failed to connect to database")?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "database connection closed");
        }
    });
    Ok(client)
}

/// Root ids are tried as UUID, then integer, then text.
pub fn parse_id(raw: &str) -> EntityId {
    match raw.parse::<EntityId>() {
        Ok(id) => id,
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profiles(file: Option<&str>, table: Option<&str>) -> ProfilesConfig {
        ProfilesConfig {
            file: file.map(str::to_string),
            table: table.map(str::to_string),
        }
    }

    #[test]
    fn profile_file_wins_over_table() {
        assert!(!reads_profile_table(&profiles(Some("profiles.json"), Some("context_profiles"))));
        assert!(!reads_profile_table(&profiles(Some("profiles.json"), None)));
        assert!(reads_profile_table(&profiles(None, Some("context_profiles"))));
    }
}
