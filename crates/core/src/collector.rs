//! Shared-state collector — finds shared mutable-state accesses in atom code
//!
//! Scans each atom's source text line-by-line: declared locals are excluded
//! via a closure-style scope pass, then the remaining references are matched
//! against naming/idiom heuristics (host globals, module singletons, database
//! call shapes, filesystem writes, cache and queue APIs) and tagged with a
//! normalized state key and category. Each access records its async context
//! and whether it sits behind a not-yet-initialized guard.
//!
//! Collection is a pure function of the atom; malformed or empty atoms yield
//! no accesses and never abort a run.

use crate::project::Atom;
use crate::race::{AccessKind, SharedStateAccess};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

// ── Regex tables ──────────────────────────────────────────────────────────────

fn global_write_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:window|globalThis|global)\.([A-Za-z_$][\w$]*)\s*(?:=[^=]|=$|\+\+|--|[+\-*/%]=|\|\|=|\?\?=)")
            .unwrap()
    })
}

fn global_mutate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:window|globalThis|global)\.([A-Za-z_$][\w$]*)\.(?:push|pop|shift|unshift|splice|sort|set|delete|clear|add)\s*\(")
            .unwrap()
    })
}

fn global_read_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:window|globalThis|global)\.([A-Za-z_$][\w$]*)").unwrap())
}

fn env_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bprocess\.env\.([A-Za-z_][\w]*)").unwrap())
}

fn db_call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:db|database|pool|knex|prisma|orm|conn|connection)\.([\w$]+)\s*\(")
            .unwrap()
    })
}

fn db_model_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Z][\w$]*)\.(create|save|update|updateOne|updateMany|findOneAndUpdate|upsert|insertMany|deleteOne|deleteMany|bulkWrite|findOne|findAll|findById)\s*\(")
            .unwrap()
    })
}

fn sql_target_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:INSERT\s+INTO|UPDATE|DELETE\s+FROM|FROM)\s+([A-Za-z_][\w]*)")
            .unwrap()
    })
}

fn sql_write_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:INSERT|UPDATE|DELETE|UPSERT|TRUNCATE|REPLACE)\b").unwrap()
    })
}

fn fs_write_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bfs\.(?:writeFile|writeFileSync|appendFile|appendFileSync|createWriteStream|truncate|truncateSync|unlink|unlinkSync|rename|renameSync|rm|rmSync|copyFile|copyFileSync|mkdir|mkdirSync)\s*\(")
            .unwrap()
    })
}

fn fs_read_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bfs\.(?:readFile|readFileSync|createReadStream|readdir|readdirSync|stat|statSync|existsSync)\s*\(")
            .unwrap()
    })
}

fn cache_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([\w$]*[Cc]ache[\w$]*|redis|redisClient|memcached|localStorage|sessionStorage)\.([\w$]+)\s*\(")
            .unwrap()
    })
}

fn queue_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([\w$]*[Qq]ueue[\w$]*)\.([\w$]+)\s*\(").unwrap())
}

fn event_register_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([\w$]+)\.(?:addEventListener|addListener|on|once|subscribe)\s*\(").unwrap()
    })
}

fn event_emit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([\w$]+)\.(?:emit|dispatchEvent|publish)\s*\(").unwrap())
}

fn assign_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z_$][\w$]*)(?:\.[\w$]+|\[[^\]]*\])*\s*(?:=[^=]|=$|\+=|-=|\*=|/=|%=|\|\|=|\?\?=|&&=)")
            .unwrap()
    })
}

/// `if (!x) x = ...` on one line; the regex crate has no backreferences, so
/// the two captures are compared by the caller
fn inline_lazy_assign_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"if\s*\(\s*!\s*([A-Za-z_$][\w$]*)\s*\)\s*\{?\s*([A-Za-z_$][\w$]*)\s*(?:=[^=]|=$)")
            .unwrap()
    })
}

fn increment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z_$][\w$]*)(?:\+\+|--)").unwrap())
}

fn mutate_method_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Za-z_$][\w$]*)\.(?:push|pop|shift|unshift|splice|sort|reverse|fill|set|delete|clear|add)\s*\(")
            .unwrap()
    })
}

/// Identifiers that read like module singletons even without an assignment
fn singleton_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Z][A-Z0-9_]{2,}|[\w$]*(?:Instance|Singleton|Store|Registry|Manager|Pool|Counter|State|Config|Settings)|instance|state|config|store|counter|settings)\b")
            .unwrap()
    })
}

fn decl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:let|const|var)\s+([A-Za-z_$][\w$]*(?:\s*,\s*[A-Za-z_$][\w$]*)*)")
            .unwrap()
    })
}

fn destructure_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:let|const|var)\s*[\{\[]([^\}\]]*)[\}\]]").unwrap())
}

fn param_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        vec![
            Regex::new(r"\bfunction\s*[\w$]*\s*\(([^)]*)\)").unwrap(),
            Regex::new(r"\(([^)]*)\)\s*=>").unwrap(),
            Regex::new(r"\b([A-Za-z_$][\w$]*)\s*=>").unwrap(),
            Regex::new(r"\bcatch\s*\(\s*([\w$]+)\s*\)").unwrap(),
        ]
    })
}

fn async_callback_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"async\s+function|async\s*\(|async\s+[\w$]+\s*=>|\.then\s*\(|\.catch\s*\(|\.finally\s*\(|setTimeout\s*\(|setInterval\s*\(|setImmediate\s*\(|process\.nextTick\s*\(")
            .unwrap()
    })
}

fn string_literal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"['"`]([^'"`]*)['"`]"#).unwrap())
}

/// Identifiers never treated as shared state
const RESERVED: &[&str] = &[
    "if", "else", "for", "while", "do", "return", "function", "const", "let", "var", "new",
    "await", "async", "typeof", "instanceof", "switch", "case", "break", "continue", "try",
    "catch", "finally", "throw", "class", "extends", "super", "delete", "in", "of", "void",
    "yield", "static", "this", "true", "false", "null", "undefined", "require", "module",
    "exports", "import", "export", "console", "Math", "JSON", "Object", "Array", "String",
    "Number", "Boolean", "Promise", "Date", "Error", "Map", "Set", "Symbol", "RegExp",
    "parseInt", "parseFloat", "isNaN", "fs", "path", "process", "window", "globalThis",
    "global", "document",
];

/// Receivers whose events are global rather than module-scoped
const GLOBAL_RECEIVERS: &[&str] = &["window", "document", "global", "globalThis", "process"];

const DB_WRITE_METHODS: &[&str] = &[
    "insert", "update", "delete", "upsert", "save", "create", "remove", "increment",
    "decrement", "truncate", "transaction",
];

const CACHE_READ_METHODS: &[&str] = &["get", "has", "getItem", "mget", "peek", "keys", "ttl"];

const QUEUE_WRITE_METHODS: &[&str] = &[
    "push", "add", "enqueue", "dequeue", "publish", "send", "pop", "shift", "unshift",
    "dispatch",
];

const QUEUE_HANDLER_METHODS: &[&str] = &["process", "consume", "subscribe", "on", "once"];

// ── Per-atom collection ───────────────────────────────────────────────────────

/// One detected access before it is keyed into the shared map
struct Detected {
    key: String,
    kind: AccessKind,
    /// Base identifier, used for lazy-guard lookback
    ident: String,
}

/// Collect all shared-state accesses performed by a single atom.
///
/// `module` scopes module-singleton keys so same-named singletons in
/// unrelated modules never collide; when empty, the file path is used.
pub fn collect_atom(atom: &Atom, file: &str, module: &str) -> Vec<SharedStateAccess> {
    if atom.code.is_empty() {
        return Vec::new();
    }

    let lines: Vec<&str> = atom.code.lines().collect();
    let locals = local_names(&lines);
    let scope = if module.is_empty() { file } else { module };

    let mut accesses = Vec::new();
    let mut seen: HashSet<(String, usize)> = HashSet::new();

    let mut brace_depth: i32 = 0;
    let mut async_stack: Vec<i32> = Vec::new();

    for (idx, raw) in lines.iter().enumerate() {
        let line = raw.trim();
        if line.is_empty() || is_comment_line(line) {
            update_depth(raw, &mut brace_depth, &mut async_stack);
            continue;
        }

        if async_callback_re().is_match(line) {
            async_stack.push(brace_depth);
        }
        let in_async = atom.is_async || !async_stack.is_empty();

        for det in detect_line(line, &locals, scope) {
            let line_no = idx + 1;
            if !seen.insert((det.key.clone(), line_no)) {
                continue;
            }
            let lazy = det.kind == AccessKind::Write && is_lazy_guarded(&lines, idx, &det.ident);
            accesses.push(SharedStateAccess {
                atom_id: atom.id.clone(),
                file: file.to_string(),
                state_key: det.key,
                access_type: if lazy { AccessKind::Init } else { det.kind },
                code: line.to_string(),
                line: line_no,
                is_async: in_async,
                is_lazy: lazy,
            });
        }

        update_depth(raw, &mut brace_depth, &mut async_stack);
    }

    accesses
}

/// Merge per-atom access lists (produced in project order) into the
/// state-key → accesses map. The BTreeMap keeps key iteration deterministic.
pub fn merge_accesses(
    per_atom: Vec<Vec<SharedStateAccess>>,
) -> BTreeMap<String, Vec<SharedStateAccess>> {
    let mut map: BTreeMap<String, Vec<SharedStateAccess>> = BTreeMap::new();
    for accesses in per_atom {
        for access in accesses {
            map.entry(access.state_key.clone()).or_default().push(access);
        }
    }
    map
}

// ── Line-level detection ──────────────────────────────────────────────────────

/// Run every idiom detector against one trimmed line, most specific first.
///
/// `claimed` tracks both emitted state keys and consumed base identifiers so
/// that the generic module-singleton fallback never re-reports a reference a
/// more specific detector already explained.
fn detect_line(line: &str, locals: &HashSet<String>, scope: &str) -> Vec<Detected> {
    let mut found = Vec::new();
    let mut claimed: HashSet<String> = HashSet::new();

    detect_globals(line, &mut found, &mut claimed);
    detect_database(line, &mut found, &mut claimed);
    detect_filesystem(line, &mut found, &mut claimed);
    detect_cache(line, locals, &mut found, &mut claimed);
    detect_queue(line, locals, &mut found, &mut claimed);
    detect_events(line, locals, scope, &mut found, &mut claimed);

    // The fallback ignores string-literal content: SQL keywords and message
    // text would otherwise read as ALL_CAPS singletons
    let stripped = strip_string_literals(line);
    detect_module_singletons(&stripped, locals, scope, &mut found, &mut claimed);

    found
}

fn detect_globals(line: &str, found: &mut Vec<Detected>, claimed: &mut HashSet<String>) {
    for caps in global_write_re().captures_iter(line) {
        let name = caps[1].to_string();
        claimed.insert(name.clone());
        found.push(Detected {
            key: format!("global:{name}"),
            kind: AccessKind::Write,
            ident: name,
        });
    }
    for caps in global_mutate_re().captures_iter(line) {
        let name = caps[1].to_string();
        if claimed.insert(name.clone()) {
            found.push(Detected {
                key: format!("global:{name}"),
                kind: AccessKind::Write,
                ident: name,
            });
        }
    }
    for caps in global_read_re().captures_iter(line) {
        let name = caps[1].to_string();
        if claimed.insert(name.clone()) {
            found.push(Detected {
                key: format!("global:{name}"),
                kind: AccessKind::Read,
                ident: name,
            });
        }
    }
    for caps in env_re().captures_iter(line) {
        let name = caps[1].to_string();
        if claimed.insert(format!("env.{name}")) {
            let kind = if line.contains(&format!("process.env.{name} =")) {
                AccessKind::Write
            } else {
                AccessKind::Read
            };
            found.push(Detected {
                key: format!("global:env.{name}"),
                kind,
                ident: name,
            });
        }
    }
}

fn detect_database(line: &str, found: &mut Vec<Detected>, claimed: &mut HashSet<String>) {
    if let Some(caps) = db_call_re().captures(line) {
        let method = caps[1].to_string();
        let entity = sql_target_re()
            .captures(line)
            .map(|c| c[1].to_lowercase())
            .or_else(|| string_literal_re().captures(line).map(|c| c[1].to_string()))
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| method.clone());
        let is_write = DB_WRITE_METHODS.contains(&method.as_str()) || sql_write_re().is_match(line);
        let key = format!("db:{entity}");
        if claimed.insert(key.clone()) {
            found.push(Detected {
                key,
                kind: if is_write {
                    AccessKind::Write
                } else {
                    AccessKind::Read
                },
                ident: entity,
            });
        }
        return;
    }

    if let Some(caps) = db_model_re().captures(line) {
        let model = caps[1].to_string();
        let method = caps[2].to_string();
        let is_write = !method.starts_with("find") || method == "findOneAndUpdate";
        let key = format!("db:{}", model.to_lowercase());
        if claimed.insert(key.clone()) {
            claimed.insert(model.clone());
            found.push(Detected {
                key,
                kind: if is_write {
                    AccessKind::Write
                } else {
                    AccessKind::Read
                },
                ident: model,
            });
        }
    }
}

fn detect_filesystem(line: &str, found: &mut Vec<Detected>, claimed: &mut HashSet<String>) {
    let kind = if fs_write_re().is_match(line) {
        AccessKind::Write
    } else if fs_read_re().is_match(line) {
        AccessKind::Read
    } else {
        return;
    };

    let target = string_literal_re()
        .captures(line)
        .map(|c| c[1].to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    let key = format!("fs:{target}");
    if claimed.insert(key.clone()) {
        found.push(Detected {
            key,
            kind,
            ident: target,
        });
    }
}

fn detect_cache(
    line: &str,
    locals: &HashSet<String>,
    found: &mut Vec<Detected>,
    claimed: &mut HashSet<String>,
) {
    for caps in cache_re().captures_iter(line) {
        let receiver = caps[1].to_string();
        let method = caps[2].to_string();
        if locals.contains(&receiver) {
            continue;
        }
        claimed.insert(receiver.clone());
        let kind = if CACHE_READ_METHODS.contains(&method.as_str()) {
            AccessKind::Read
        } else {
            AccessKind::Write
        };
        let entry_key = string_literal_re()
            .captures(line)
            .map(|c| c[1].to_string())
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| receiver.clone());
        let key = format!("cache:{entry_key}");
        if claimed.insert(key.clone()) {
            found.push(Detected {
                key,
                kind,
                ident: receiver.clone(),
            });
        }
    }
}

fn detect_queue(
    line: &str,
    locals: &HashSet<String>,
    found: &mut Vec<Detected>,
    claimed: &mut HashSet<String>,
) {
    for caps in queue_re().captures_iter(line) {
        let receiver = caps[1].to_string();
        let method = caps[2].to_string();
        if locals.contains(&receiver) {
            continue;
        }
        claimed.insert(receiver.clone());
        let kind = if QUEUE_WRITE_METHODS.contains(&method.as_str()) {
            AccessKind::Write
        } else if QUEUE_HANDLER_METHODS.contains(&method.as_str()) {
            AccessKind::EventHandle
        } else {
            AccessKind::Read
        };
        let key = format!("queue:{receiver}");
        if claimed.insert(key.clone()) {
            found.push(Detected {
                key,
                kind,
                ident: receiver.clone(),
            });
        }
    }
}

fn detect_events(
    line: &str,
    locals: &HashSet<String>,
    scope: &str,
    found: &mut Vec<Detected>,
    claimed: &mut HashSet<String>,
) {
    let registrations: Vec<String> = event_register_re()
        .captures_iter(line)
        .map(|c| c[1].to_string())
        .collect();
    let emissions: Vec<String> = event_emit_re()
        .captures_iter(line)
        .map(|c| c[1].to_string())
        .collect();

    let event = string_literal_re().captures(line).map(|c| c[1].to_string());

    let mut emit = |receiver: String, kind: AccessKind| {
        if locals.contains(&receiver) || receiver == "this" || claimed.contains(&receiver) {
            return;
        }
        let base = if GLOBAL_RECEIVERS.contains(&receiver.as_str()) {
            format!("global:{receiver}")
        } else {
            format!("module:{scope}#{receiver}")
        };
        let key = match &event {
            Some(ev) if !ev.is_empty() => format!("{base}@{ev}"),
            _ => base,
        };
        if claimed.insert(key.clone()) {
            claimed.insert(receiver.clone());
            found.push(Detected {
                key,
                kind,
                ident: receiver,
            });
        }
    };

    for receiver in registrations {
        emit(receiver, AccessKind::EventHandle);
    }
    for receiver in emissions {
        emit(receiver, AccessKind::Write);
    }
}

fn detect_module_singletons(
    stripped: &str,
    locals: &HashSet<String>,
    scope: &str,
    found: &mut Vec<Detected>,
    claimed: &mut HashSet<String>,
) {
    let is_shared =
        |name: &str| !name.is_empty() && !locals.contains(name) && !RESERVED.contains(&name);

    // Writes first so a write claim beats the read heuristic on the same key
    let mut candidates: Vec<(String, AccessKind)> = Vec::new();

    if let Some(caps) = inline_lazy_assign_re().captures(stripped) {
        if caps[1] == caps[2] {
            let name = caps[1].to_string();
            if is_shared(&name) {
                candidates.push((name, AccessKind::Write));
            }
        }
    }

    if let Some(caps) = assign_re().captures(stripped) {
        let name = caps[1].to_string();
        if is_shared(&name) {
            candidates.push((name, AccessKind::Write));
        }
    }

    for caps in increment_re().captures_iter(stripped) {
        let name = caps[1].to_string();
        if is_shared(&name) {
            candidates.push((name, AccessKind::Write));
        }
    }

    for caps in mutate_method_re().captures_iter(stripped) {
        let name = caps[1].to_string();
        if is_shared(&name) {
            candidates.push((name, AccessKind::Write));
        }
    }

    // Reads only count for identifiers that look like singletons; counting
    // every bare identifier would drown the classifier in noise
    for caps in singleton_name_re().captures_iter(stripped) {
        let m = caps.get(1).unwrap();
        let name = m.as_str().to_string();
        if !is_shared(&name) {
            continue;
        }
        // Followed by `(` means a call, not a state read
        if stripped[m.end()..].trim_start().starts_with('(') {
            continue;
        }
        candidates.push((name, AccessKind::Read));
    }

    for (name, kind) in candidates {
        if claimed.contains(&name) {
            continue;
        }
        let key = format!("module:{scope}#{name}");
        if claimed.insert(key.clone()) {
            claimed.insert(name.clone());
            found.push(Detected {
                key,
                kind,
                ident: name,
            });
        }
    }
}

// ── Scope & context helpers ───────────────────────────────────────────────────

/// Extract locally declared names: let/const/var bindings, destructurings,
/// and function/arrow/catch parameters
fn local_names(lines: &[&str]) -> HashSet<String> {
    let mut locals = HashSet::new();

    for line in lines {
        for caps in decl_re().captures_iter(line) {
            for name in caps[1].split(',') {
                locals.insert(name.trim().to_string());
            }
        }
        for caps in destructure_re().captures_iter(line) {
            for part in caps[1].split(',') {
                // `{ a: renamed }` binds the right side; `{ a }` binds a
                let name = part.split(':').next_back().unwrap_or("");
                let name = name.split('=').next().unwrap_or("").trim();
                if !name.is_empty() {
                    locals.insert(name.trim_start_matches("...").to_string());
                }
            }
        }
        for re in param_res() {
            for caps in re.captures_iter(line) {
                for part in caps[1].split(',') {
                    let name = part.split('=').next().unwrap_or("").trim();
                    let name = name.trim_matches(|c: char| "{}[] ".contains(c));
                    if !name.is_empty()
                        && name
                            .chars()
                            .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
                    {
                        locals.insert(name.to_string());
                    }
                }
            }
        }
    }

    locals
}

/// Check whether a write at `idx` sits behind a not-yet-initialized guard
fn is_lazy_guarded(lines: &[&str], idx: usize, name: &str) -> bool {
    let line = lines[idx].trim();

    // Same-line guards: `if (!x) x = ...`, `x ||= ...`, `x = x || ...`
    if line.contains(&format!("if (!{name}")) || line.contains(&format!("if(!{name}")) {
        return true;
    }
    if line.contains(&format!("{name} ||=")) || line.contains(&format!("{name} ??=")) {
        return true;
    }
    if line.contains(&format!("{name} = {name} ||"))
        || line.contains(&format!("{name} = {name} ??"))
    {
        return true;
    }

    // Guard on one of the two preceding non-empty lines
    let mut looked = 0;
    for prev in lines[..idx].iter().rev() {
        let prev = prev.trim();
        if prev.is_empty() {
            continue;
        }
        looked += 1;
        if prev.contains(&format!("if (!{name}"))
            || prev.contains(&format!("if(!{name}"))
            || prev.contains(&format!("if ({name} === null"))
            || prev.contains(&format!("if ({name} === undefined"))
            || prev.contains(&format!("if ({name} == null"))
            || prev.contains(&format!("typeof {name} === 'undefined'"))
        {
            return true;
        }
        if looked >= 2 {
            break;
        }
    }

    false
}

/// Check if a line is a comment (covers JS/TS)
fn is_comment_line(line: &str) -> bool {
    line.starts_with("//") || line.starts_with('*') || line.starts_with("/*")
}

/// Blank out string-literal content so keyword heuristics don't fire on text
fn strip_string_literals(line: &str) -> String {
    string_literal_re().replace_all(line, "''").into_owned()
}

/// Track brace depth and close async-callback scopes that have ended
fn update_depth(raw: &str, brace_depth: &mut i32, async_stack: &mut Vec<i32>) {
    for ch in raw.chars() {
        match ch {
            '{' => *brace_depth += 1,
            '}' => *brace_depth = (*brace_depth - 1).max(0),
            _ => {}
        }
    }
    while let Some(&opened_at) = async_stack.last() {
        if *brace_depth <= opened_at {
            async_stack.pop();
        } else {
            break;
        }
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
