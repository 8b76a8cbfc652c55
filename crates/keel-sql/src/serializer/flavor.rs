use super::Serializer;

use keel_core::driver::Capability;

impl Serializer<'static> {
    pub fn sqlite() -> Serializer<'static> {
        Serializer::new(&Capability::SQLITE)
    }

    pub fn postgresql() -> Serializer<'static> {
        Serializer::new(&Capability::POSTGRESQL)
    }

    pub fn cockroachdb() -> Serializer<'static> {
        Serializer::new(&Capability::COCKROACHDB)
    }

    pub fn mysql() -> Serializer<'static> {
        Serializer::new(&Capability::MYSQL)
    }

    pub fn mariadb() -> Serializer<'static> {
        Serializer::new(&Capability::MARIADB)
    }

    pub fn sqlserver() -> Serializer<'static> {
        Serializer::new(&Capability::SQLSERVER)
    }

    pub fn oracle() -> Serializer<'static> {
        Serializer::new(&Capability::ORACLE)
    }
}
