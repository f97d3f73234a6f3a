pub mod changelog_plugin;
pub mod docs_plugin;
pub mod git_plugin;
pub mod npm_plugin;
pub mod template_plugin;

pub use changelog_plugin::ConventionalChangelog;
pub use docs_plugin::DocsPlugin;
pub use git_plugin::GitPlugin;
pub use npm_plugin::NpmPlugin;
pub use template_plugin::HttpTemplateSource;
