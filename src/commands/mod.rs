pub mod delete;
pub mod generate;
pub mod history;
pub mod import;
pub mod new;
pub mod preview;
pub mod show;
pub mod sweep;

use anyhow::{Result, bail};
use calshare_core::lifecycle::{ArtifactLifecycleManager, LifecycleSettings, Stores};
use calshare_core::{CalShareConfig, GeneratedArtifact};

/// A fresh editing session over the configured stores.
pub fn open_session(config: &CalShareConfig) -> Result<ArtifactLifecycleManager> {
    let settings = LifecycleSettings::from_config(config)?;
    Ok(ArtifactLifecycleManager::new(Stores::from_config(config), settings))
}

/// Find a history record by full id or by a unique id prefix.
pub fn find_artifact(history: Vec<GeneratedArtifact>, id: &str) -> Result<GeneratedArtifact> {
    let id = id.trim().to_lowercase();
    if id.is_empty() {
        bail!("No artifact id given");
    }

    let mut matches: Vec<_> = history
        .into_iter()
        .filter(|a| a.id.to_string().starts_with(&id))
        .collect();

    match matches.len() {
        0 => bail!("No generated file with id '{}'. Run `calshare history` to list them.", id),
        1 => Ok(matches.remove(0)),
        n => bail!("Id '{}' matches {} generated files, use more characters", id, n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calshare_core::EventDraftSet;
    use chrono::{Duration, Utc};

    fn make_artifact() -> GeneratedArtifact {
        GeneratedArtifact::new(EventDraftSet::default(), Utc::now(), Duration::days(7), None, None)
    }

    #[test]
    fn test_find_artifact_by_prefix() {
        let a = make_artifact();
        let b = make_artifact();
        let prefix: String = a.id.to_string().chars().take(8).collect();

        let found = find_artifact(vec![a.clone(), b], &prefix.to_uppercase()).unwrap();
        assert_eq!(found.id, a.id);
    }

    #[test]
    fn test_find_artifact_unknown_or_ambiguous() {
        let a = make_artifact();
        let b = make_artifact();

        assert!(find_artifact(vec![a.clone()], "zzzz").is_err());
        assert!(find_artifact(vec![a, b], "").is_err());
    }
}
