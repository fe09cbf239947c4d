mod yaml;

pub use yaml::{find_infrastructure_file, YamlFrontend};
