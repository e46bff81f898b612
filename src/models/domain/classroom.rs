use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Classroom {
    pub id: String,
    pub name: String,
    pub teacher_id: String,
    #[serde(default)]
    pub student_ids: Vec<String>,
}
