use exn::ResultExt;
use pixtag_cache::error::{ErrorKind, Result};
use pixtag_cache::{CacheContext, MetadataCache, ThumbnailCache};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::cli::{Command, Kind, Target};

pub async fn run(command: &Command, context: &CacheContext, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Clear { target } => clear(*target, context, out).await,
        Command::Keys { kind } => {
            for key in keys(*kind, context).await? {
                writeln!(out, "{}", key.display()).or_raise(|| ErrorKind::Io)?;
            }
            Ok(())
        },
        Command::Prune { kind } => {
            let pruned = prune(*kind, context).await?;
            writeln!(out, "{}: {pruned} pruned", name(*kind)).or_raise(|| ErrorKind::Io)
        },
        Command::Compact => {
            context.compact().await?;
            writeln!(out, "compacted").or_raise(|| ErrorKind::Io)
        },
        Command::Stats => {
            writeln!(out, "{}: {}", MetadataCache::NAME, context.metadata().count().await?).or_raise(|| ErrorKind::Io)?;
            writeln!(out, "{}: {}", ThumbnailCache::NAME, context.thumbnails().count().await?).or_raise(|| ErrorKind::Io)
        },
    }
}

fn name(kind: Kind) -> &'static str {
    match kind {
        Kind::Metadata => MetadataCache::NAME,
        Kind::Thumbnails => ThumbnailCache::NAME,
    }
}

async fn clear(target: Target, context: &CacheContext, out: &mut impl Write) -> Result<()> {
    let cleared = match target {
        Target::All => context.providers().clear_all().await?,
        Target::Metadata => vec![(MetadataCache::NAME.to_string(), context.metadata().clear().await?)],
        Target::Thumbnails => vec![(ThumbnailCache::NAME.to_string(), context.thumbnails().clear().await?)],
    };
    for (name, count) in cleared {
        writeln!(out, "{name}: {count} removed").or_raise(|| ErrorKind::Io)?;
    }
    Ok(())
}

async fn keys(kind: Kind, context: &CacheContext) -> Result<BTreeSet<PathBuf>> {
    match kind {
        Kind::Metadata => context.metadata().list_keys().await,
        Kind::Thumbnails => context.thumbnails().list_keys().await,
    }
}

/// Delete records whose image file is gone. Returns how many were deleted.
async fn prune(kind: Kind, context: &CacheContext) -> Result<u64> {
    let mut pruned = 0;
    for key in keys(kind, context).await? {
        if exists(&key).await {
            continue;
        }
        let deleted = match kind {
            Kind::Metadata => context.metadata().delete(&key).await?,
            Kind::Thumbnails => context.thumbnails().delete(&key).await?,
        };
        if deleted {
            tracing::debug!(path = %key.display(), "Pruned record");
            pruned += 1;
        }
    }
    tracing::info!(cache = name(kind), pruned, "Pruned cache");
    Ok(pruned)
}

/// Files that can't be checked (permissions, unmounted volumes) count as present.
async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixtag_cache::FileIdentity;
    use pixtag_exif::ExifTagSet;
    use rstest::rstest;

    async fn populated(dir: &Path) -> CacheContext {
        let context = CacheContext::in_memory().await.unwrap();
        for name in ["kept.jpg", "gone.jpg"] {
            let identity = FileIdentity::new(dir.join(name), 1).unwrap();
            context.metadata().put(&identity, &ExifTagSet::new(1)).await.unwrap();
            context.thumbnails().insert(&identity, &[0xff]).await.unwrap();
        }
        std::fs::write(dir.join("kept.jpg"), b"jpeg").unwrap();
        context
    }

    async fn output(command: Command, context: &CacheContext) -> String {
        let mut out = Vec::new();
        run(&command, context, &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_stats() {
        let temp_dir = tempfile::tempdir().unwrap();
        let context = populated(temp_dir.path()).await;
        assert_eq!(output(Command::Stats, &context).await, "metadata: 2\nthumbnails: 2\n");
    }

    #[rstest]
    #[case(Target::All, "metadata: 2 removed\nthumbnails: 2 removed\n", 0)]
    #[case(Target::Metadata, "metadata: 2 removed\n", 2)]
    #[case(Target::Thumbnails, "thumbnails: 2 removed\n", 0)]
    #[tokio::test]
    async fn test_clear(#[case] target: Target, #[case] expected: &str, #[case] thumbnails_left: u64) {
        let temp_dir = tempfile::tempdir().unwrap();
        let context = populated(temp_dir.path()).await;
        assert_eq!(output(Command::Clear { target }, &context).await, expected);
        assert_eq!(context.thumbnails().count().await.unwrap(), thumbnails_left);
    }

    #[tokio::test]
    async fn test_keys() {
        let temp_dir = tempfile::tempdir().unwrap();
        let context = populated(temp_dir.path()).await;
        let listed = output(Command::Keys { kind: Kind::Thumbnails }, &context).await;
        let expected = [temp_dir.path().join("gone.jpg"), temp_dir.path().join("kept.jpg")]
            .map(|path| format!("{}\n", path.display()))
            .concat();
        assert_eq!(listed, expected);
    }

    #[rstest]
    #[case(Kind::Metadata)]
    #[case(Kind::Thumbnails)]
    #[tokio::test]
    async fn test_prune_removes_missing_files(#[case] kind: Kind) {
        let temp_dir = tempfile::tempdir().unwrap();
        let context = populated(temp_dir.path()).await;
        let report = output(Command::Prune { kind }, &context).await;
        assert_eq!(report, format!("{}: 1 pruned\n", name(kind)));
        let left = keys(kind, &context).await.unwrap();
        assert_eq!(left.into_iter().collect::<Vec<_>>(), vec![temp_dir.path().join("kept.jpg")]);
    }
}
