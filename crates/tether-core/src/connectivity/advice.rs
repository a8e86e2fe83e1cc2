use super::speed::QualityTier;
use super::status::{ConnectionStatus, LinkType};

/// User-facing advisories for the current link situation. Pure function of
/// the inputs, no I/O; callers surface these verbatim.
pub fn recommendations(
    status: ConnectionStatus,
    quality: Option<QualityTier>,
    stable: bool,
) -> Vec<String> {
    let mut out = Vec::new();

    match status {
        ConnectionStatus::Disconnected => {
            out.push("You are offline. Changes will sync when the connection returns.".to_string());
            out.push("Check Wi-Fi or cellular settings.".to_string());
            return out;
        }
        ConnectionStatus::Unknown => {
            out.push("Connectivity has not been determined yet. Run a probe or wait for the first observation.".to_string());
            return out;
        }
        ConnectionStatus::Connected(link) => {
            if !stable {
                out.push(
                    "The connection keeps dropping. Avoid large transfers until it settles."
                        .to_string(),
                );
            }
            match quality {
                Some(QualityTier::Poor) => out.push(
                    "Bandwidth is very low. Try moving closer to the router or switching networks."
                        .to_string(),
                ),
                Some(QualityTier::Fair) => {
                    out.push("Bandwidth is limited. Large media may load slowly.".to_string())
                }
                _ => {}
            }
            if link == LinkType::Cellular {
                out.push("You are on cellular data. Large downloads will use your data plan.".to_string());
            }
        }
    }

    if out.is_empty() {
        out.push("Connection looks healthy.".to_string());
    }
    out
}
