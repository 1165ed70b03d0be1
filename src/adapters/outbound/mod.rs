pub mod azure;
pub mod llm;
pub mod registry;
pub mod site;
pub mod templating;
