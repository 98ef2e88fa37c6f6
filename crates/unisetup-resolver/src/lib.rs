use anyhow::Result;
use unisetup_core::{ReleaseStage, UnisetupError, UnityVersion, DEFAULT_MATCH_STAGE};

/// Picks the highest version in `pool` that satisfies `spec`.
pub fn select_version(spec: &str, pool: &[String]) -> Result<String> {
    let wanted = UnityVersion::parse(spec)?;

    let mut candidates: Vec<(UnityVersion, &String)> = pool
        .iter()
        .filter_map(|raw| UnityVersion::parse(raw).ok().map(|version| (version, raw)))
        .collect();
    candidates.sort_by(|(left, _), (right, _)| right.cmp(left));

    let Some((_, selected)) = candidates
        .into_iter()
        .find(|(candidate, _)| wanted.matches(candidate))
    else {
        return Err(UnisetupError::NoMatch {
            spec: wanted.to_string(),
        }
        .into());
    };

    if selected == spec {
        log::info!("selected version {selected} exactly matches input version");
    } else {
        log::info!("selected version {selected} for input version {spec}");
    }
    Ok(selected.clone())
}

/// Resolves each token against `pool`, dropping repeated results but keeping
/// first-seen order.
pub fn resolve_versions(specs: &[String], pool: &[String]) -> Result<Vec<String>> {
    let mut resolved: Vec<String> = Vec::with_capacity(specs.len());
    for spec in specs {
        let version = select_version(spec, pool)?;
        if !resolved.contains(&version) {
            resolved.push(version);
        }
    }
    Ok(resolved)
}

/// Loosest stage any of `specs` can match, at least final. A spec without a
/// stage letter matches up to [`DEFAULT_MATCH_STAGE`], so the catalog has to
/// be loaded that far for it.
pub fn refresh_strength(specs: &[String]) -> Result<ReleaseStage> {
    let mut strength = ReleaseStage::Final;
    for spec in specs {
        let stage = UnityVersion::parse(spec)?
            .stage
            .unwrap_or(DEFAULT_MATCH_STAGE);
        strength = strength.max(stage);
    }
    Ok(strength)
}
