//! Command handlers for the MiniCloud CLI.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::future::join_all;
use tokio::sync::watch;
use tracing::{info, warn};

use minicloud_core::auth::ReauthState;
use minicloud_core::models::NewFunction;
use minicloud_core::utils::truncate_string;
use minicloud_core::{Config, Console, CredentialStore, SessionStore, Theme};

/// How often `health --watch` polls the backend
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(20);

/// Width of the message body column
const MESSAGE_PREVIEW_LEN: usize = 60;

pub struct App {
    /// Configuration as saved on disk, without command line overrides
    config: Config,
    console: Console,
    reauth: watch::Receiver<ReauthState>,
    json: bool,
}

impl App {
    pub fn new(api_url: Option<String>, json: bool) -> Result<Self> {
        let config = Config::load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        });

        let mut effective = config.clone();
        if let Some(url) = api_url {
            effective.base_url = url;
        }

        let session = Arc::new(SessionStore::open(Config::session_path()?));
        let reauth = session.reauth_signal().subscribe();
        let console = Console::from_config(&effective, session)
            .with_context(|| format!("Invalid backend URL {}", effective.base_url))?;

        Ok(Self {
            config,
            console,
            reauth,
            json,
        })
    }

    /// Print a sign-in hint if any call during this run needed one
    pub fn report_reauth(&mut self) {
        if self.reauth.has_changed().unwrap_or(false) && self.reauth.borrow_and_update().required {
            eprintln!("Your session has ended. Run `minicloud login` to sign in again.");
        }
    }

    // ===== Account =====

    pub async fn login(&mut self, email: Option<String>, remember: bool) -> Result<()> {
        let email = match email {
            Some(email) => email,
            None => prompt_email(self.config.last_email.as_deref())?,
        };
        if email.is_empty() {
            bail!("E-mail required");
        }

        let password = if CredentialStore::has_password(&email) && confirm("Use stored password? [Y/n]: ")? {
            CredentialStore::get_password(&email)?
        } else {
            prompt_password("Password: ")?
        };
        if password.is_empty() {
            bail!("Password required");
        }

        println!("Authenticating...");
        self.console.login(&email, &password).await?;

        if remember {
            if let Err(e) = CredentialStore::store(&email, &password) {
                warn!(error = %e, "Failed to store credentials");
            }
        }
        self.remember_email(email);

        let identity = self.console.session().identity().unwrap_or_default();
        println!("Signed in as {}", identity);
        Ok(())
    }

    pub async fn register(&mut self, name: &str, email: &str) -> Result<()> {
        let password = prompt_password("Password: ")?;
        if password.is_empty() {
            bail!("Password required");
        }
        if prompt_password("Confirm password: ")? != password {
            bail!("Passwords do not match");
        }

        self.console.register(name, email, &password).await?;
        self.remember_email(email.to_string());
        println!("Account created, signed in as {}", email);
        Ok(())
    }

    pub fn logout(&mut self) -> Result<()> {
        let identity = self.console.session().identity();
        let was_signed_in = self.console.logout();

        if let Some(email) = identity {
            if let Err(e) = CredentialStore::delete(&email) {
                warn!(error = %e, "Failed to delete stored password");
            }
        }

        if was_signed_in {
            println!("Signed out");
        } else {
            println!("Not signed in");
        }
        Ok(())
    }

    pub fn whoami(&self) -> Result<()> {
        match self.console.session().credential() {
            Some(credential) => println!(
                "{} (signed in {})",
                credential.identity,
                credential.created_at.format("%Y-%m-%d %H:%M UTC")
            ),
            None => println!("Not signed in"),
        }
        Ok(())
    }

    fn remember_email(&mut self, email: String) {
        self.config.last_email = Some(email);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
    }

    // ===== Buckets =====

    pub async fn list_buckets(&self, refresh: bool) -> Result<()> {
        let buckets = self.console.buckets(refresh).await?;
        if self.json {
            return print_json(serde_json::to_value(&*buckets)?);
        }
        if buckets.is_empty() {
            println!("No buckets");
            return Ok(());
        }
        println!("{:>6}  {:<32}  {}", "ID", "NAME", "CREATED");
        for bucket in buckets.iter() {
            println!("{:>6}  {:<32}  {}", bucket.id, bucket.name, bucket.display_created());
        }
        Ok(())
    }

    pub async fn create_bucket(&self, name: &str) -> Result<()> {
        let bucket = self.console.create_bucket(name).await?;
        println!("Created bucket {} (id {})", bucket.name, bucket.id);
        Ok(())
    }

    pub async fn show_bucket(&self, id: i64) -> Result<()> {
        let bucket = self.console.bucket(id).await?;
        if self.json {
            return print_json(serde_json::to_value(&bucket)?);
        }
        println!("ID:      {}", bucket.id);
        println!("Name:    {}", bucket.name);
        println!("Created: {}", bucket.display_created());
        Ok(())
    }

    pub async fn delete_bucket(&self, id: i64) -> Result<()> {
        self.console.delete_bucket(id).await?;
        println!("Deleted bucket {}", id);
        Ok(())
    }

    // ===== Objects =====

    pub async fn list_objects(&self, bucket: &str, refresh: bool) -> Result<()> {
        let objects = self.console.objects(bucket, refresh).await?;
        if self.json {
            return print_json(serde_json::to_value(&*objects)?);
        }
        if objects.is_empty() {
            println!("No objects in {}", bucket);
            return Ok(());
        }
        println!("{:<40}  {:<6}  {:>12}  {}", "KEY", "KIND", "SIZE", "CREATED");
        for object in objects.iter() {
            println!(
                "{:<40}  {:<6}  {:>12}  {}",
                truncate_string(&object.object_key, 40),
                object.kind().label(),
                object.display_size(),
                format_timestamp(object.created_at.as_ref()),
            );
        }
        Ok(())
    }

    pub async fn upload(&self, bucket: &str, files: &[PathBuf]) -> Result<()> {
        let uploads = files.iter().map(|path| async move {
            (path, self.console.upload_file(bucket, path).await)
        });

        let mut failed = 0;
        for (path, result) in join_all(uploads).await {
            match result {
                Ok(object) => println!("Uploaded {} as {}", path.display(), object.object_key),
                Err(e) => {
                    failed += 1;
                    eprintln!("Failed to upload {}: {}", path.display(), e);
                }
            }
        }

        if failed > 0 {
            bail!("{} of {} uploads failed", failed, files.len());
        }
        Ok(())
    }

    pub async fn download(&self, key: &str, output: Option<PathBuf>) -> Result<()> {
        let bytes = self.console.download(key).await?;
        let path = output.unwrap_or_else(|| default_download_path(key));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    pub async fn delete_object(&self, key: &str) -> Result<()> {
        self.console.delete_object(key).await?;
        println!("Deleted {}", key);
        Ok(())
    }

    pub fn object_url(&self, key: &str) -> Result<()> {
        println!("{}", self.console.object_url(key)?);
        Ok(())
    }

    // ===== Functions =====

    pub async fn list_functions(&self, refresh: bool) -> Result<()> {
        let functions = self.console.functions(refresh).await?;
        if self.json {
            return print_json(serde_json::to_value(&*functions)?);
        }
        if functions.is_empty() {
            println!("No functions");
            return Ok(());
        }
        println!("{:<32}  {:<10}  {}", "NAME", "RUNTIME", "CREATED");
        for function in functions.iter() {
            println!(
                "{:<32}  {:<10}  {}",
                function.function_name,
                function.display_runtime(),
                format_timestamp(function.created_at.as_ref()),
            );
        }
        Ok(())
    }

    pub async fn create_function(&self, name: String, runtime: String, code_file: &Path) -> Result<()> {
        let code = tokio::fs::read_to_string(code_file)
            .await
            .with_context(|| format!("Failed to read {}", code_file.display()))?;
        let function = self
            .console
            .create_function(&NewFunction {
                function_name: name,
                runtime,
                code,
            })
            .await?;
        println!("Created function {}", function.function_name);
        Ok(())
    }

    pub async fn invoke_function(&self, name: &str, input: Option<&str>) -> Result<()> {
        let input: Option<serde_json::Value> = input
            .map(serde_json::from_str)
            .transpose()
            .context("Function input must be valid JSON")?;
        let result = self.console.invoke_function(name, input.as_ref()).await?;
        if self.json {
            return print_json(serde_json::to_value(&result)?);
        }

        let outcome = if result.success { "succeeded" } else { "failed" };
        println!("{} {} in {} ms", name, outcome, result.execution_time_ms);
        if !result.message().is_empty() {
            println!("{}", result.message());
        }
        if !result.success {
            bail!("Function {} failed", name);
        }
        Ok(())
    }

    // ===== Queues =====

    pub async fn send_message(&self, queue: &str, payload: &str) -> Result<()> {
        let message = self.console.send_message(queue, payload).await?;
        match message.id {
            Some(id) => println!("Sent message {} to {}", id, queue),
            None => println!("Sent message to {}", queue),
        }
        Ok(())
    }

    pub async fn list_messages(&self, queue: &str, refresh: bool) -> Result<()> {
        let messages = self.console.messages(queue, refresh).await?;
        if self.json {
            return print_json(serde_json::to_value(&*messages)?);
        }
        if messages.is_empty() {
            println!("No messages in {}", queue);
            return Ok(());
        }
        println!("{:>6}  {:<10}  {:<60}  {}", "ID", "STATUS", "BODY", "CREATED");
        for message in messages.iter() {
            println!(
                "{:>6}  {:<10}  {:<60}  {}",
                message.id.map(|id| id.to_string()).unwrap_or_default(),
                message.status().label(),
                truncate_string(&message.message_body, MESSAGE_PREVIEW_LEN),
                format_timestamp(message.created_at.as_ref()),
            );
        }
        Ok(())
    }

    pub async fn receive_message(&self, queue: &str) -> Result<()> {
        match self.console.receive_message(queue).await? {
            Some(message) if self.json => print_json(serde_json::to_value(&message)?),
            Some(message) => {
                match message.id {
                    Some(id) => println!("Message {} from {}:", id, queue),
                    None => println!("Message from {}:", queue),
                }
                println!("{}", message.message_body);
                Ok(())
            }
            None => {
                println!("No pending messages in {}", queue);
                Ok(())
            }
        }
    }

    pub async fn ack_message(&self, id: i64, success: bool) -> Result<()> {
        self.console.ack_message(id, success).await?;
        if success {
            println!("Acknowledged message {}", id);
        } else {
            println!("Marked message {} as failed", id);
        }
        Ok(())
    }

    // ===== Misc =====

    pub async fn health(&self, watch: bool) -> Result<()> {
        if !watch {
            println!("{}", self.console.health().await);
            return Ok(());
        }

        let mut ticker = tokio::time::interval(HEALTH_POLL_INTERVAL);
        loop {
            ticker.tick().await;
            println!("{}", self.console.health().await);
        }
    }

    /// Load the main lists together, the way a dashboard opens
    pub async fn overview(&self) -> Result<()> {
        let (buckets, functions) = tokio::join!(self.console.buckets(false), self.console.functions(false));
        let buckets = buckets?;
        let functions = functions?;

        let first = match buckets.first() {
            Some(bucket) => Some((
                bucket.name.clone(),
                self.console.objects(&bucket.name, false).await?,
            )),
            None => None,
        };
        info!(buckets = buckets.len(), functions = functions.len(), "Overview loaded");

        if self.json {
            return print_json(serde_json::json!({
                "buckets": &*buckets,
                "functions": &*functions,
                "objects": first.as_ref().map(|(_, objects)| &**objects),
            }));
        }

        println!("Buckets:   {}", buckets.len());
        println!("Functions: {}", functions.len());
        if let Some((name, objects)) = first {
            println!("Objects in {}: {}", name, objects.len());
        }
        Ok(())
    }

    pub fn theme(&mut self, theme: Option<&str>) -> Result<()> {
        match theme {
            None => println!("{}", self.config.theme),
            Some(value) => {
                let theme = if value.trim().eq_ignore_ascii_case("toggle") {
                    self.config.theme.toggled()
                } else {
                    value.parse::<Theme>()?
                };
                self.config.theme = theme;
                self.config.save()?;
                println!("Theme set to {}", theme);
            }
        }
        Ok(())
    }
}

fn print_json(value: serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn format_timestamp<T: std::fmt::Display>(value: Option<&T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Local file name for a downloaded object: the last segment of its key
fn default_download_path(key: &str) -> PathBuf {
    let name = key
        .rsplit('/')
        .find(|s| !s.is_empty())
        .filter(|s| *s != "." && *s != "..")
        .unwrap_or("download");
    PathBuf::from(name)
}

fn prompt_email(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => print!("E-mail [{}]: ", last),
        None => print!("E-mail: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    match (input.is_empty(), last) {
        (true, Some(last)) => Ok(last.to_string()),
        _ => Ok(input.to_string()),
    }
}

fn prompt_password(prompt: &str) -> Result<String> {
    let password = rpassword::prompt_password(prompt)?;
    Ok(password)
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_lowercase() != "n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_path_uses_last_segment() {
        assert_eq!(default_download_path("photos/2024/cat.png"), PathBuf::from("cat.png"));
        assert_eq!(default_download_path("report.pdf"), PathBuf::from("report.pdf"));
        assert_eq!(default_download_path("dir/"), PathBuf::from("dir"));
        assert_eq!(default_download_path(""), PathBuf::from("download"));
        assert_eq!(default_download_path(".."), PathBuf::from("download"));
        assert_eq!(default_download_path("photos/."), PathBuf::from("download"));
    }

    #[test]
    fn test_format_timestamp_placeholder() {
        assert_eq!(format_timestamp::<String>(None), "-");
        assert_eq!(format_timestamp(Some(&"2024-01-01".to_string())), "2024-01-01");
    }
}
