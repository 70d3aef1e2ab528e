//! Class-name string scan.
//!
//! The JVM keeps internal class names (`net/minecraft/...`) as UTF-8 in
//! metaspace. Finding them confirms the target really is the game and gives
//! anchor addresses for manual exploration.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::memory::QueryMemory;
use crate::scan::{MemoryScanner, ParsedPattern};

/// Internal class names searched by the string scan, covering both the
/// intermediary/yarn and the official mappings.
pub const CLASS_SIGNATURES: &[&str] = &[
    "net/minecraft/client/MinecraftClient",
    "net/minecraft/client/Minecraft",
    "net/minecraft/entity/Entity",
    "net/minecraft/entity/player/PlayerEntity",
    "net/minecraft/entity/player/EntityPlayer",
    "net/minecraft/client/world/ClientWorld",
    "net/minecraft/world/entity/LivingEntity",
    "net/minecraft/world/level/Level",
];

/// One hit of the class-name scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringFind {
    pub address: u64,
    pub text: String,
}

/// Scan for every string in `signatures`, accumulating all hits.
///
/// The scanner's cancel flag is checked after each signature; a cancelled
/// scan returns the hits found so far.
pub fn scan_strings<R: QueryMemory>(scanner: &MemoryScanner<'_, R>, signatures: &[&str]) -> Vec<StringFind> {
    info!("Scanning for {} known class-name signatures...", signatures.len());
    let mut finds = Vec::new();

    for signature in signatures {
        let pattern = ParsedPattern::exact(signature.as_bytes());
        let hits = scanner.scan_process(&pattern);

        if let Some(first) = hits.first() {
            info!(
                "  \"{}\" -> {} hit(s), first at 0x{:X}",
                signature,
                hits.len(),
                first.address
            );
        }

        finds.extend(hits.into_iter().map(|hit| StringFind {
            address: hit.address,
            text: signature.to_string(),
        }));

        if scanner.is_cancelled() {
            debug!("String scan cancelled after \"{}\"", signature);
            break;
        }
    }

    info!("String scan complete: {} total hits", finds.len());
    finds
}
