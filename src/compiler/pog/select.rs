use std::collections::BTreeSet;

use regex::Regex;

use crate::compiler::pog::obligation::ProofObligationList;
use crate::compiler::pog::PogErr;
use crate::compiler::srcloc::Srcloc;

impl ProofObligationList {
    /// The obligations whose number is listed or whose definition name
    /// matches one of the patterns in full.  With nothing to select by,
    /// every obligation is kept.  Numbers are left as they were.
    pub fn select(
        &self,
        numbers: &[usize],
        name_patterns: &[String],
    ) -> Result<ProofObligationList, PogErr> {
        let mut result = self.clone();
        if numbers.is_empty() && name_patterns.is_empty() {
            return Ok(result);
        }

        let wanted: BTreeSet<usize> = numbers.iter().copied().collect();
        let patterns = name_patterns
            .iter()
            .map(|p| {
                Regex::new(&format!("^(?:{})$", p)).map_err(|e| {
                    PogErr(
                        Srcloc::start("*command*"),
                        format!("bad name pattern {}: {}", p, e),
                    )
                })
            })
            .collect::<Result<Vec<Regex>, PogErr>>()?;

        result.retain(|po| {
            wanted.contains(&po.number) || patterns.iter().any(|r| r.is_match(&po.name))
        });
        Ok(result)
    }
}
