use crate::{async_trait, bail, driver::QueryRunner, Result};

/// One applied (or pending) migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Row id in the migrations table, once stored.
    pub id: Option<i64>,

    /// Milliseconds since the epoch, taken from the migration name.
    pub timestamp: i64,

    pub name: String,
}

impl Migration {
    /// Builds a migration record from a name ending in a 13-digit
    /// millisecond timestamp, e.g. `CreatePosts1700000000000`.
    pub fn from_name(name: impl Into<String>) -> Result<Migration> {
        let name = name.into();
        let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        if digits < 13 {
            bail!("migration name {name:?} must end with a 13-digit timestamp");
        }

        let timestamp = name[name.len() - 13..]
            .parse()
            .map_err(anyhow::Error::from)?;

        Ok(Migration {
            id: None,
            timestamp,
            name,
        })
    }
}

/// Schema change applied through a query runner.
#[async_trait]
pub trait MigrationInterface: Send + Sync {
    async fn up(&self, runner: &dyn QueryRunner) -> Result<()>;

    async fn down(&self, runner: &dyn QueryRunner) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_from_name() {
        let migration = Migration::from_name("CreatePosts1700000000000").unwrap();
        assert_eq!(migration.timestamp, 1_700_000_000_000);
        assert_eq!(migration.name, "CreatePosts1700000000000");
        assert!(migration.id.is_none());

        assert!(Migration::from_name("CreatePosts").is_err());
    }
}
