use super::ColumnId;

#[derive(Debug, Clone)]
pub struct Index {
    pub name: String,
    pub columns: Vec<ColumnId>,
    pub unique: bool,
}
