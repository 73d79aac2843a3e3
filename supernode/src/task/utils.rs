use crate::Error;

/// Joiner of the two identifiers of a composite key.
pub const KEY_JOIN_CHAR: char = '@';

/// Return the primary key of the fetch task registered by `cid` for `task_id`.
pub fn generate_key(cid: &str, task_id: &str) -> Result<String, Error> {
    if cid.is_empty() {
        return Err(Error::EmptyValue("cid"));
    }

    if task_id.is_empty() {
        return Err(Error::EmptyValue("task_id"));
    }

    Ok(join(cid, task_id))
}

/// Return the peer index key of `peer_id` serving `task_id`.
#[inline]
pub fn generate_peer_key(peer_id: &str, task_id: &str) -> String {
    join(peer_id, task_id)
}

/// Return the key prefix shared by every peer index entry of `peer_id`.
#[inline]
pub fn peer_prefix(peer_id: &str) -> String {
    format!("{peer_id}{KEY_JOIN_CHAR}")
}

/// Return the key suffix shared by every peer index entry of `task_id`.
#[inline]
pub fn task_suffix(task_id: &str) -> String {
    format!("{KEY_JOIN_CHAR}{task_id}")
}

/// Return every way of splitting a composite key back into its two identifiers.
///
/// Identifiers may themselves contain the joiner, so a key may decode in several ways: one per joiner it contains.
pub fn splits(key: &str) -> impl Iterator<Item = (&str, &str)> {
    key.match_indices(KEY_JOIN_CHAR).map(move |(i, _)| (&key[..i], &key[i + KEY_JOIN_CHAR.len_utf8()..]))
}

fn join(a: &str, b: &str) -> String {
    format!("{a}{KEY_JOIN_CHAR}{b}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_key() {
        assert_eq!(generate_key("client", "task").as_deref(), Ok("client@task"));
        assert_eq!(generate_key("", "task"), Err(Error::EmptyValue("cid")));
        assert_eq!(generate_key("client", ""), Err(Error::EmptyValue("task_id")));
        assert_eq!(generate_peer_key("peer", "task"), "peer@task");
    }

    #[test]
    fn test_splits() {
        assert!(splits("peer@task").eq([("peer", "task")]));
        assert!(splits("10.0.0.1@home@task").eq([("10.0.0.1", "home@task"), ("10.0.0.1@home", "task")]));
        assert!(splits("peer@").eq([("peer", "")]));
        assert_eq!(splits("malformed").count(), 0);
    }

    #[test]
    fn test_prefix_and_suffix() {
        let key = generate_peer_key("peer", "task");

        assert!(key.starts_with(&peer_prefix("peer")));
        assert!(!key.starts_with(&peer_prefix("pee")));
        assert!(key.ends_with(&task_suffix("task")));
        assert!(!key.ends_with(&task_suffix("ask")));
    }
}
