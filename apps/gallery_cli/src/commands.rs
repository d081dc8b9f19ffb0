use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, bail, Context, Result};
use clap::Subcommand;
use gallery_core::{
    account, AuthGateway, Credential, GalleryClient, GalleryError, GallerySnapshot, HttpGateway,
    ImageEdit, ImageFile, ImageUpload,
};
use shared::{
    domain::{ImageId, Item},
    protocol::RegisterRequest,
};
use tracing::{info, warn};

use crate::{config::Settings, token_store::TokenStore};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and remember the session token.
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session token.
    Logout,
    ChangePassword {
        #[arg(long)]
        old_password: String,
        #[arg(long)]
        new_password: String,
    },
    /// Show one page of the gallery.
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Titles in file order; missing or blank titles become `Image {n}`.
        #[arg(long = "title")]
        titles: Vec<String>,
    },
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    Delete {
        id: String,
    },
    /// Move `source` to the position currently held by `target`.
    Move {
        source: String,
        target: String,
        /// Show the resulting order without saving it.
        #[arg(long)]
        dry_run: bool,
    },
}

pub struct App {
    settings: Settings,
    gateway: Arc<HttpGateway>,
    tokens: TokenStore,
}

impl App {
    pub fn new(settings: Settings) -> Result<Self> {
        let gateway = HttpGateway::with_timeout(&settings.server_url, settings.request_timeout())
            .with_context(|| format!("invalid server url '{}'", settings.server_url))?;
        let tokens = TokenStore::new(settings.token_path.clone());
        Ok(Self {
            settings,
            gateway: Arc::new(gateway),
            tokens,
        })
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        let result = self.dispatch(command).await;
        if let Err(err) = &result {
            if err
                .downcast_ref::<GalleryError>()
                .is_some_and(GalleryError::requires_reauth)
            {
                warn!("session rejected, clearing stored token");
                self.tokens.clear()?;
                return Err(anyhow!("{err}; please log in again"));
            }
        }
        result
    }

    async fn dispatch(&self, command: Command) -> Result<()> {
        match command {
            Command::Login { email, password } => {
                let password = password_or_prompt(password)?;
                account::validate_login(&email, &password)?;
                let credential = self.gateway.login(email.trim(), &password).await?;
                self.tokens.save(&credential)?;
                println!("logged in as {}", email.trim());
            }
            Command::Register {
                username,
                email,
                phone,
                password,
            } => {
                let registration = RegisterRequest {
                    username: username.trim().to_string(),
                    email: email.trim().to_string(),
                    phone: phone.trim().to_string(),
                    password: password_or_prompt(password)?,
                };
                account::validate_registration(&registration)?;
                let credential = self.gateway.register(registration).await?;
                self.tokens.save(&credential)?;
                println!("registered and logged in as {}", username.trim());
            }
            Command::Logout => {
                self.tokens.clear()?;
                println!("logged out");
            }
            Command::ChangePassword {
                old_password,
                new_password,
            } => {
                account::validate_password_change(&old_password, &new_password)?;
                let credential = self.credential()?;
                self.gateway
                    .change_password(&credential, &old_password, &new_password)
                    .await?;
                println!("password changed");
            }
            Command::List { page } => {
                let (client, _) = self.loaded_client().await?;
                client.paginate(page).await;
                print_page(&client.snapshot().await);
            }
            Command::Upload { files, titles } => {
                let uploads = files
                    .iter()
                    .enumerate()
                    .map(|(index, path)| {
                        let title = titles.get(index).cloned().unwrap_or_default();
                        Ok(ImageUpload::new(read_image(path)?, title))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let (client, credential) = self.loaded_client().await?;
                let count = client.upload_images(&credential, uploads).await?;
                println!("uploaded {count} image(s)");
            }
            Command::Edit { id, title, image } => {
                let id = ImageId::new(id);
                let (client, credential) = self.loaded_client().await?;
                let current = client
                    .working()
                    .await
                    .into_iter()
                    .find(|item| item.id == id)
                    .ok_or_else(|| anyhow!("no image with id {id}"))?;
                let mut edit = ImageEdit::title(title.unwrap_or(current.title));
                if let Some(path) = image {
                    edit = edit.with_image(read_image(&path)?);
                }
                let item = client.update_image(&credential, &id, edit).await?;
                println!("updated {} \"{}\"", item.id, item.title);
            }
            Command::Delete { id } => {
                let id = ImageId::new(id);
                let (client, credential) = self.loaded_client().await?;
                client.delete_image(&credential, &id).await?;
                println!("deleted {id}");
            }
            Command::Move {
                source,
                target,
                dry_run,
            } => {
                let (source, target) = (ImageId::new(source), ImageId::new(target));
                let (client, credential) = self.loaded_client().await?;
                move_image(&client, &credential, &source, &target, dry_run).await?;
            }
        }
        Ok(())
    }

    fn credential(&self) -> Result<Credential> {
        let credential = self
            .tokens
            .load()?
            .ok_or_else(|| anyhow!("not logged in; run `gallery login` first"))?;
        credential.ensure_valid()?;
        Ok(credential)
    }

    async fn loaded_client(&self) -> Result<(GalleryClient, Credential)> {
        let credential = self.credential()?;
        let client = GalleryClient::with_page_size(self.gateway.clone(), self.settings.page_size);
        client.refresh(&credential).await?;
        Ok((client, credential))
    }
}

/// Drags `source` onto `target` the way a pointer would: from the page that
/// shows `source`, then saves or cancels.
async fn move_image(
    client: &GalleryClient,
    credential: &Credential,
    source: &ImageId,
    target: &ImageId,
    dry_run: bool,
) -> Result<()> {
    let page = client
        .page_of(source)
        .await
        .ok_or_else(|| anyhow!("no image with id {source}"))?;
    if client.page_of(target).await.is_none() {
        bail!("no image with id {target}");
    }
    client.paginate(page).await;
    client.enter_rearrange().await?;
    client.begin_drag(source).await?;
    let changed = client.drop_on(target).await?;

    print_order(&client.working().await);
    if dry_run || !changed {
        client.cancel_rearrange().await?;
        if !changed {
            println!("order unchanged");
        }
        return Ok(());
    }
    client.save_order(credential).await?;
    info!(source = %source, target = %target, "order saved");
    println!("order saved");
    Ok(())
}

fn read_image(path: &Path) -> Result<ImageFile> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read image '{}'", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let file = ImageFile::new(filename, bytes);
    Ok(match mime_for(path) {
        Some(mime) => file.with_mime_type(mime),
        None => file,
    })
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("password: ");
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn print_page(snapshot: &GallerySnapshot) {
    if snapshot.total == 0 {
        println!("gallery is empty");
        return;
    }
    println!(
        "page {}/{} ({} images)",
        snapshot.page, snapshot.page_count, snapshot.total
    );
    for item in &snapshot.visible {
        println!("{:>4}  {}  {}  {}", item.order, item.id, item.title, item.image_ref);
    }
}

fn print_order(items: &[Item]) {
    for item in items {
        println!("{:>4}  {}  {}", item.order, item.id, item.title);
    }
}
