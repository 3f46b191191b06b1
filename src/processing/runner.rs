use std::path::Path;

use anyhow::{Context as _, Result};

use crate::alert::{alert_on_error, Alerter, SlackAlerter};
use crate::config::Config;
use crate::context::Context;
use crate::graphics::images;
use crate::processing::args::{Args, Command};
use crate::processing::curate::{self, StdinConfirm};
use crate::processing::{enroll, search};

async fn search_file(ctx: &Context, file: &Path) -> crate::error::Result<()> {
    let bytes = tokio::fs::read(file).await?;
    let probe = images::normalize(&bytes)?;
    let outcome = search::find_best_match(ctx, &probe).await?;
    println!("{}", outcome.message());
    Ok(())
}

async fn upload_dir(ctx: &Context, root: &Path) -> crate::error::Result<()> {
    let uploads = enroll::upload_directory(ctx, root).await?;
    let total = uploads.len();
    let mut failed = 0;
    for upload in &uploads {
        match &upload.result {
            Ok(_) => println!("ok      {} {}", upload.idol_id, upload.path.display()),
            Err(e) => {
                failed += 1;
                println!("failed  {} {}: {}", upload.idol_id, upload.path.display(), e);
            }
        }
    }
    println!("{} / {} uploaded", total - failed, total);
    Ok(())
}

async fn list(ctx: &Context, pattern: &str, fresh: bool) -> crate::error::Result<()> {
    for idol in curate::list_matching(ctx, pattern, fresh).await? {
        println!("{idol}");
    }
    Ok(())
}

async fn dump_faces(ctx: &Context, fresh: bool) -> crate::error::Result<()> {
    for idol in ctx.idols(fresh).await?.iter() {
        match serde_json::to_string(idol) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(idol = %idol, error = %e, "failed to serialize idol"),
        }
    }
    Ok(())
}

pub async fn run(args: Args) -> Result<()> {
    let mut config = Config::from_env().context("failed to load configuration")?;
    config.verbose |= args.verbose;
    if let Some(collection) = args.collection {
        config.collection_id = collection;
    }
    if let Some(bucket) = args.bucket {
        config.bucket = bucket;
    }

    let alerter = match &config.alert_webhook {
        Some(url) => Some(SlackAlerter::new(url.as_str()).context("failed to build alert client")?),
        None => None,
    };
    let alerter = alerter.as_ref().map(|a| a as &dyn Alerter);

    let ctx = Context::connect(config).await;

    match args.command {
        Command::Search { file } => {
            alert_on_error(alerter, "search", search_file(&ctx, &file)).await?;
        }
        Command::Upload { file, idol } => {
            let response =
                alert_on_error(alerter, "upload_idol", enroll::upload_local(&ctx, &file, &idol)).await?;
            for record in &response.face_records {
                println!("indexed {} as face {}", idol, record.face_id);
            }
        }
        Command::UploadDir { root } => {
            alert_on_error(alerter, "upload_directory", upload_dir(&ctx, &root)).await?;
        }
        Command::List { pattern, fresh } => {
            alert_on_error(alerter, "list_faces_of_idol", list(&ctx, &pattern, fresh)).await?;
        }
        Command::Faces { fresh } => {
            alert_on_error(alerter, "list_faces", dump_faces(&ctx, fresh)).await?;
        }
        Command::Delete {
            face_id,
            idol,
            fresh,
            yes,
        } => {
            let confirm = StdinConfirm { assume_yes: yes };
            let report = alert_on_error(
                alerter,
                "delete_face",
                curate::delete_matching(&ctx, &face_id, &idol, fresh, &confirm),
            )
            .await?;
            println!("{}: {}", report.idol, report);
        }
        Command::ResetCollection { yes: _ } => {
            alert_on_error(alerter, "clear_all_idols", enroll::reset_collection(&ctx)).await?;
            println!("collection {} reset", ctx.config().collection_id);
        }
    }
    Ok(())
}
