use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about = "Match faces against a collection of reference idols", long_about = None)]
pub struct Args {
    /// Log progress of batch uploads
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// Rekognition collection id (overrides IDOLFACE_COLLECTION_ID)
    #[arg(short, long, global = true)]
    pub collection: Option<String>,
    /// S3 bucket for reference images (overrides IDOLFACE_BUCKET)
    #[arg(short, long, global = true)]
    pub bucket: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Identify the face in a photo
    Search {
        file: PathBuf,
    },
    /// Upload one reference photo of an idol
    Upload {
        file: PathBuf,
        #[arg(short, long)]
        idol: String,
    },
    /// Upload <root>/<idol id>/<photo> for every idol directory
    UploadDir {
        root: PathBuf,
    },
    /// List idols whose id matches a regular expression
    List {
        #[arg(default_value = ".*")]
        pattern: String,
        /// Refetch the roster instead of using the cache
        #[arg(short, long)]
        fresh: bool,
    },
    /// Dump the raw roster as JSON lines
    Faces {
        #[arg(short, long)]
        fresh: bool,
    },
    /// Delete the face matching a face id pattern, and its image
    Delete {
        face_id: String,
        /// Idol the face must belong to
        #[arg(short, long)]
        idol: String,
        #[arg(short, long)]
        fresh: bool,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Drop every indexed face and recreate the collection
    ResetCollection {
        /// Required: the reset cannot be undone
        #[arg(long, required = true)]
        yes: bool,
    },
}
