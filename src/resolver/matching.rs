//! Fuzzy team-name matching and kickoff selection.
//!
//! Names are normalized (diacritics folded, apostrophes dropped, any other
//! non-alphanumeric run collapsed to one space, lower-cased) and match when
//! equal, when one contains the other, or when every word of one appears in
//! order in the other, where a word may also stand for the initials of
//! consecutive words ("ny yankees" covers "new york yankees").

use super::types::ProviderEvent;

fn fold_char(c: char) -> Option<&'static str> {
    let s = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'ď' | 'đ' | 'ð' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => "g",
        'ĥ' | 'ħ' => "h",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'ĵ' => "j",
        'ķ' => "k",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => "l",
        'ñ' | 'ń' | 'ņ' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
        'œ' => "oe",
        'ŕ' | 'ŗ' | 'ř' => "r",
        'ś' | 'ŝ' | 'ş' | 'š' | 'ș' => "s",
        'ß' => "ss",
        'ţ' | 'ť' | 'ŧ' | 'ț' => "t",
        'þ' => "th",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'ŵ' => "w",
        'ý' | 'ÿ' | 'ŷ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(s)
}

fn is_apostrophe(c: char) -> bool {
    matches!(c, '\'' | '’' | '‘' | '`' | 'ʼ')
}

pub fn normalize_name(raw: &str) -> String {
    let mut folded = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        if is_apostrophe(c) {
            continue;
        }
        match fold_char(c) {
            Some(s) => folded.push_str(s),
            None if c.is_alphanumeric() => folded.push(c),
            None => folded.push(' '),
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Every token of `short` is found, in order, in `long`, either verbatim or
/// as the initials of that many consecutive tokens.
fn tokens_cover(short: &[&str], long: &[&str]) -> bool {
    if short.is_empty() {
        return false;
    }
    let mut j = 0;
    for tok in short {
        let width = tok.chars().count();
        let mut matched = false;
        while j < long.len() {
            if long[j] == *tok {
                j += 1;
                matched = true;
                break;
            }
            if width >= 2
                && j + width <= long.len()
                && long[j..j + width]
                    .iter()
                    .zip(tok.chars())
                    .all(|(word, initial)| word.starts_with(initial))
            {
                j += width;
                matched = true;
                break;
            }
            j += 1;
        }
        if !matched {
            return false;
        }
    }
    true
}

/// Symmetric fuzzy match. Blank names never match anything.
pub fn names_match(a: &str, b: &str) -> bool {
    let na = normalize_name(a);
    let nb = normalize_name(b);
    if na.is_empty() || nb.is_empty() {
        return false;
    }
    if na == nb || na.contains(&nb) || nb.contains(&na) {
        return true;
    }
    let ta: Vec<&str> = na.split(' ').collect();
    let tb: Vec<&str> = nb.split(' ').collect();
    tokens_cover(&ta, &tb) || tokens_cover(&tb, &ta)
}

/// Both participants match, in either home/away order.
pub fn event_matches_pair(event: &ProviderEvent, team_a: &str, team_b: &str) -> bool {
    let (Some(home), Some(away)) = (event.home_name(), event.away_name()) else {
        return false;
    };
    (names_match(home, team_a) && names_match(away, team_b))
        || (names_match(home, team_b) && names_match(away, team_a))
}

/// Candidate with the smallest `|kickoff - target|`; ties go to the earlier
/// kickoff. Events without a usable kickoff rank after all timed ones.
pub fn closest_kickoff<'a, I>(candidates: I, target: i64) -> Option<&'a ProviderEvent>
where
    I: IntoIterator<Item = &'a ProviderEvent>,
{
    candidates.into_iter().min_by_key(|ev| match ev.kickoff_epoch() {
        Some(ts) => (0u8, ts.abs_diff(target), ts),
        None => (1u8, u64::MAX, i64::MAX),
    })
}
