/// Options that control which schemas are introspected.
#[derive(Debug, Clone, Default)]
pub struct IntrospectOptions {
    /// Only these schemas when set; otherwise every non-system schema.
    pub include_schemas: Option<Vec<String>>,
    /// Schemas removed after the include filter.
    pub exclude_schemas: Vec<String>,
    pub include_system_schemas: bool,
}

impl IntrospectOptions {
    pub fn with_schemas(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            include_schemas: (!include.is_empty()).then_some(include),
            exclude_schemas: exclude,
            include_system_schemas: false,
        }
    }
}
