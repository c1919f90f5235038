use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MonteBrickError, Result};

const SIMID_PATTERN: &str = r"^file(?P<fileid>\d+)_rs(?P<rowstart>\d+)_skip(?P<skipid>\d+)$";

static SIMID_RE: LazyLock<std::result::Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new(SIMID_PATTERN));

/// Identifier of one injection pass: which slice of which candidate file,
/// and how many times collided sources have been deferred.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimId {
    pub fileid: u32,
    pub rowstart: usize,
    pub skipid: u32,
}

impl SimId {
    pub fn new(fileid: u32, rowstart: usize, skipid: u32) -> Self {
        Self {
            fileid,
            rowstart,
            skipid,
        }
    }

    /// The same slice at the previous pass. `None` for pass 0.
    pub fn previous(&self) -> Option<SimId> {
        self.skipid.checked_sub(1).map(|skipid| SimId { skipid, ..*self })
    }

    pub fn next(&self) -> SimId {
        SimId {
            skipid: self.skipid + 1,
            ..*self
        }
    }
}

impl fmt::Display for SimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file{}_rs{}_skip{}", self.fileid, self.rowstart, self.skipid)
    }
}

impl FromStr for SimId {
    type Err = MonteBrickError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || MonteBrickError::InvalidSimId(s.to_string());
        let re = SIMID_RE.as_ref().map_err(Clone::clone)?;
        let caps = re.captures(s).ok_or_else(invalid)?;
        Ok(SimId {
            fileid: caps["fileid"].parse().map_err(|_| invalid())?,
            rowstart: caps["rowstart"].parse().map_err(|_| invalid())?,
            skipid: caps["skipid"].parse().map_err(|_| invalid())?,
        })
    }
}
