//! Structural diff between two ordered JSON arrays.
//!
//! Elements are aligned on their longest common subsequence. Within each run
//! of unmatched elements, removed and inserted elements are paired up and
//! diffed field by field; the surplus becomes plain removals or insertions.
//! Operation paths are relative to the array (`"2"`, `"2/ref/revision"`) and
//! every index refers to the array as patched by the preceding operations,
//! so applying the operations in order to the old array yields the new one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// A single positional patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
}

impl PatchOp {
    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. } | Self::Remove { path } | Self::Replace { path, .. } => path,
        }
    }
}

// ---------------------------------------------------------------------------
// Path encoding
// ---------------------------------------------------------------------------

fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

fn child_path(parent: &str, key: &str) -> String {
    format!("{parent}/{}", escape(key))
}

/// Split a patch path into unescaped segments.
pub fn split_path(path: &str) -> Vec<String> {
    path.split('/').map(unescape).collect()
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

enum Edit {
    Keep,
    Delete(usize),
    Insert(usize),
}

/// Edit script aligning `old` to `new` on their longest common subsequence.
fn edit_script(old: &[Value], new: &[Value]) -> Vec<Edit> {
    let (n, m) = (old.len(), new.len());
    // lcs[i][j]: LCS length of old[i..] and new[j..].
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut script = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            script.push(Edit::Keep);
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            script.push(Edit::Delete(i));
            i += 1;
        } else {
            script.push(Edit::Insert(j));
            j += 1;
        }
    }
    script.extend((i..n).map(Edit::Delete));
    script.extend((j..m).map(Edit::Insert));
    script
}

/// Compute the operations that turn `old` into `new`.
pub fn diff_arrays(old: &[Value], new: &[Value]) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    let mut cursor = 0usize;
    let mut deleted: Vec<usize> = Vec::new();
    let mut inserted: Vec<usize> = Vec::new();

    let flush = |deleted: &mut Vec<usize>,
                 inserted: &mut Vec<usize>,
                 cursor: &mut usize,
                 ops: &mut Vec<PatchOp>| {
        let paired = deleted.len().min(inserted.len());
        for (d, i) in deleted.iter().zip(inserted.iter()) {
            diff_values(&old[*d], &new[*i], &cursor.to_string(), ops);
            *cursor += 1;
        }
        for _ in paired..deleted.len() {
            ops.push(PatchOp::Remove {
                path: cursor.to_string(),
            });
        }
        for i in &inserted[paired..] {
            ops.push(PatchOp::Add {
                path: cursor.to_string(),
                value: new[*i].clone(),
            });
            *cursor += 1;
        }
        deleted.clear();
        inserted.clear();
    };

    for edit in edit_script(old, new) {
        match edit {
            Edit::Keep => {
                flush(&mut deleted, &mut inserted, &mut cursor, &mut ops);
                cursor += 1;
            }
            Edit::Delete(i) => deleted.push(i),
            Edit::Insert(j) => inserted.push(j),
        }
    }
    flush(&mut deleted, &mut inserted, &mut cursor, &mut ops);
    ops
}

/// Field-level diff of two values at `path`. Objects are descended into;
/// anything else, arrays included, is replaced whole.
fn diff_values(old: &Value, new: &Value, path: &str, ops: &mut Vec<PatchOp>) {
    if old == new {
        return;
    }
    match (old, new) {
        (Value::Object(a), Value::Object(b)) => {
            for (key, va) in a {
                match b.get(key) {
                    Some(vb) => diff_values(va, vb, &child_path(path, key), ops),
                    None => ops.push(PatchOp::Remove {
                        path: child_path(path, key),
                    }),
                }
            }
            for (key, vb) in b {
                if !a.contains_key(key) {
                    ops.push(PatchOp::Add {
                        path: child_path(path, key),
                        value: vb.clone(),
                    });
                }
            }
        }
        _ => ops.push(PatchOp::Replace {
            path: path.to_string(),
            value: new.clone(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Patch
// ---------------------------------------------------------------------------

fn parse_index(segment: &str, path: &str) -> Result<usize, CoreError> {
    segment
        .parse::<usize>()
        .map_err(|_| CoreError::BadData(format!("invalid array index in patch path '{path}'")))
}

/// Navigate from `root` through `segments`, returning the addressed value.
fn locate<'a>(
    root: &'a mut Value,
    segments: &[String],
    path: &str,
) -> Result<&'a mut Value, CoreError> {
    let mut current = root;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get_mut(segment),
            Value::Array(items) => {
                let index = parse_index(segment, path)?;
                items.get_mut(index)
            }
            _ => None,
        }
        .ok_or_else(|| CoreError::BadData(format!("patch path '{path}' does not exist")))?;
    }
    Ok(current)
}

/// Apply `ops` in order to `target`.
pub fn apply_patch(target: &mut Vec<Value>, ops: &[PatchOp]) -> Result<(), CoreError> {
    for op in ops {
        let path = op.path();
        let segments = split_path(path);
        let (first, rest) = segments
            .split_first()
            .ok_or_else(|| CoreError::BadData("empty patch path".to_string()))?;
        let index = parse_index(first, path)?;

        if rest.is_empty() {
            match op {
                PatchOp::Add { value, .. } if index <= target.len() => {
                    target.insert(index, value.clone());
                }
                PatchOp::Remove { .. } if index < target.len() => {
                    target.remove(index);
                }
                PatchOp::Replace { value, .. } if index < target.len() => {
                    target[index] = value.clone();
                }
                _ => {
                    return Err(CoreError::BadData(format!(
                        "patch index out of range in '{path}'"
                    )))
                }
            }
            continue;
        }

        let element = target
            .get_mut(index)
            .ok_or_else(|| CoreError::BadData(format!("patch index out of range in '{path}'")))?;
        let (key, parents) = rest
            .split_last()
            .ok_or_else(|| CoreError::BadData(format!("empty patch path '{path}'")))?;
        let parent = locate(element, parents, path)?;
        let map = parent
            .as_object_mut()
            .ok_or_else(|| CoreError::BadData(format!("patch path '{path}' is not an object field")))?;
        match op {
            PatchOp::Add { value, .. } | PatchOp::Replace { value, .. } => {
                map.insert(key.clone(), value.clone());
            }
            PatchOp::Remove { .. } => {
                map.remove(key);
            }
        }
    }
    Ok(())
}
