#[derive(Debug)]
pub struct Capability {
    /// Which database this is. SQL emission matches on the kind instead of
    /// inspecting the driver.
    pub kind: DatabaseKind,

    /// When true, the database uses a SQL-based query language. Query
    /// builders refuse to run against other databases.
    pub sql: bool,

    /// How (or whether) the database returns rows written by
    /// INSERT/UPDATE/DELETE.
    pub returning: Returning,

    /// The database can generate UUID primary keys itself. When false, UUIDs
    /// are generated client-side before insert.
    pub uuid_generation: bool,

    /// `DEFAULT` may appear in a VALUES list. When false, a missing value is
    /// bound as the column default or NULL.
    pub insert_default_keyword: bool,

    /// Longest identifier the database accepts. Longer aliases are shortened.
    pub max_alias_length: Option<usize>,

    /// Column types that are read back through a spatial text conversion.
    pub spatial_types: &'static [&'static str],

    /// Which row a multi-row insert's generated identifier refers to.
    pub insert_id: InsertIdSemantics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseKind {
    Mysql,
    Mariadb,
    AuroraMysql,
    Postgres,
    Cockroachdb,
    Sqlserver,
    Oracle,
    Sqlite,
    Sqljs,
    Mongodb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Returning {
    None,

    /// `... RETURNING cols`
    Returning,

    /// SQL Server `OUTPUT INSERTED.col`
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertIdSemantics {
    /// The id of the first inserted row (MySQL).
    First,

    /// The id of the last inserted row (SQLite).
    Last,
}

impl DatabaseKind {
    pub fn is_mysql_family(self) -> bool {
        matches!(
            self,
            DatabaseKind::Mysql | DatabaseKind::Mariadb | DatabaseKind::AuroraMysql
        )
    }

    pub fn is_postgres_family(self) -> bool {
        matches!(self, DatabaseKind::Postgres | DatabaseKind::Cockroachdb)
    }

    pub fn is_sqlite_family(self) -> bool {
        matches!(self, DatabaseKind::Sqlite | DatabaseKind::Sqljs)
    }
}

impl Capability {
    /// SQLite capabilities.
    pub const SQLITE: Self = Self {
        kind: DatabaseKind::Sqlite,
        sql: true,
        returning: Returning::Returning,
        uuid_generation: false,
        insert_default_keyword: false,
        max_alias_length: None,
        spatial_types: &[],
        insert_id: InsertIdSemantics::Last,
    };

    /// sql.js capabilities. Same dialect as SQLite, without `RETURNING`.
    pub const SQLJS: Self = Self {
        kind: DatabaseKind::Sqljs,
        returning: Returning::None,
        ..Self::SQLITE
    };

    /// PostgreSQL capabilities
    pub const POSTGRESQL: Self = Self {
        kind: DatabaseKind::Postgres,
        uuid_generation: true,
        insert_default_keyword: true,
        max_alias_length: Some(63),
        spatial_types: &["geometry", "geography"],
        insert_id: InsertIdSemantics::First,
        ..Self::SQLITE
    };

    /// CockroachDB capabilities
    pub const COCKROACHDB: Self = Self {
        kind: DatabaseKind::Cockroachdb,
        spatial_types: &[],
        ..Self::POSTGRESQL
    };

    /// MySQL capabilities
    pub const MYSQL: Self = Self {
        kind: DatabaseKind::Mysql,
        returning: Returning::None,
        uuid_generation: false,
        insert_default_keyword: true,
        max_alias_length: Some(63),
        spatial_types: &[
            "geometry",
            "point",
            "linestring",
            "polygon",
            "multipoint",
            "multilinestring",
            "multipolygon",
            "geometrycollection",
        ],
        insert_id: InsertIdSemantics::First,
        ..Self::SQLITE
    };

    /// MariaDB capabilities. Supports `INSERT ... RETURNING`.
    pub const MARIADB: Self = Self {
        kind: DatabaseKind::Mariadb,
        returning: Returning::Returning,
        ..Self::MYSQL
    };

    /// Aurora MySQL (Data API) capabilities
    pub const AURORA_MYSQL: Self = Self {
        kind: DatabaseKind::AuroraMysql,
        ..Self::MYSQL
    };

    /// SQL Server capabilities
    pub const SQLSERVER: Self = Self {
        kind: DatabaseKind::Sqlserver,
        returning: Returning::Output,
        uuid_generation: true,
        insert_default_keyword: true,
        max_alias_length: None,
        spatial_types: &["geometry", "geography"],
        insert_id: InsertIdSemantics::First,
        ..Self::SQLITE
    };

    /// Oracle capabilities
    pub const ORACLE: Self = Self {
        kind: DatabaseKind::Oracle,
        returning: Returning::Returning,
        uuid_generation: false,
        insert_default_keyword: false,
        max_alias_length: Some(30),
        spatial_types: &[],
        insert_id: InsertIdSemantics::First,
        ..Self::SQLITE
    };

    /// MongoDB capabilities. Not a SQL database: query builders are rejected.
    pub const MONGODB: Self = Self {
        kind: DatabaseKind::Mongodb,
        sql: false,
        returning: Returning::None,
        uuid_generation: false,
        insert_default_keyword: false,
        max_alias_length: None,
        spatial_types: &[],
        insert_id: InsertIdSemantics::First,
    };

    pub fn is_returning_supported(&self) -> bool {
        self.returning != Returning::None
    }
}
