pub mod server;

mod run;

/// What the command line asked for. Scribe only serves the blog.
#[derive(Debug)]
pub enum Action {
    /// Open the database, bootstrap the schema and serve HTTP until Ctrl-C.
    Server(server::Args),
}

impl Action {
    /// Run the action, then flush any exported traces.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
