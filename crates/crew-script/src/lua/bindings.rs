//! Rust-to-Lua bindings for the script API.

use mlua::{Lua, Table, Value as LuaValue};

use crate::sandbox::{Permission, SandboxConfig, SandboxViolation, ViolationKind};
use crate::scratch::ScratchStore;
use crate::types::ScratchValue;

/// Create the `scratch` namespace over the shared store.
pub fn create_scratch_api(lua: &Lua, store: &ScratchStore) -> mlua::Result<Table> {
    let scratch = lua.create_table()?;

    // scratch.get(key) - value or nil
    let s = store.clone();
    let get = lua.create_function(move |lua, key: String| match s.get(&key) {
        Some(value) => scratch_to_lua(lua, value),
        None => Ok(LuaValue::Nil),
    })?;
    scratch.set("get", get)?;

    // scratch.set(key, value) - nil value deletes
    let s = store.clone();
    let set = lua.create_function(move |_, (key, value): (String, LuaValue)| {
        match lua_to_scratch(value)? {
            Some(value) => {
                s.set(key, value);
            }
            None => {
                s.delete(&key);
            }
        }
        Ok(())
    })?;
    scratch.set("set", set)?;

    // scratch.delete(key) - whether the key existed
    let s = store.clone();
    let delete = lua.create_function(move |_, key: String| Ok(s.delete(&key).is_some()))?;
    scratch.set("delete", delete)?;

    Ok(scratch)
}

fn scratch_to_lua(lua: &Lua, value: ScratchValue) -> mlua::Result<LuaValue> {
    Ok(match value {
        ScratchValue::Bool(b) => LuaValue::Boolean(b),
        ScratchValue::Integer(i) => LuaValue::Integer(i),
        ScratchValue::Number(n) => LuaValue::Number(n),
        ScratchValue::String(s) => LuaValue::String(lua.create_string(&s)?),
    })
}

fn lua_to_scratch(value: LuaValue) -> mlua::Result<Option<ScratchValue>> {
    Ok(Some(match value {
        LuaValue::Nil => return Ok(None),
        LuaValue::Boolean(b) => ScratchValue::Bool(b),
        LuaValue::Integer(i) => ScratchValue::Integer(i),
        LuaValue::Number(n) => ScratchValue::Number(n),
        LuaValue::String(s) => ScratchValue::String(s.to_string_lossy()),
        other => {
            return Err(mlua::Error::RuntimeError(format!(
                "scratch values must be strings, numbers or booleans, got {}",
                other.type_name()
            )));
        }
    }))
}

/// Create the `fs` namespace, confined to the sandbox root.
pub fn create_fs_api(lua: &Lua, sandbox: &SandboxConfig) -> mlua::Result<Table> {
    let fs = lua.create_table()?;

    // fs.read(path) - contents, or nil when the file does not exist
    let sb = sandbox.clone();
    let read = lua.create_function(move |lua, path: String| {
        let full = sb.resolve(&path).map_err(mlua::Error::external)?;
        sb.require(Permission::Read, &full)
            .map_err(mlua::Error::external)?;

        let meta = match std::fs::metadata(&full) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LuaValue::Nil),
            Err(e) => return Err(mlua::Error::external(e)),
        };
        if meta.len() as usize > sb.max_read_size {
            return Err(mlua::Error::external(SandboxViolation {
                kind: ViolationKind::FileTooLarge,
                description: format!("{path} ({} bytes)", meta.len()),
                path: Some(full),
            }));
        }
        let content = std::fs::read(&full).map_err(mlua::Error::external)?;
        Ok(LuaValue::String(lua.create_string(&content)?))
    })?;
    fs.set("read", read)?;

    // fs.create(path, content?) - create or overwrite, making parent dirs
    let sb = sandbox.clone();
    let create = lua.create_function(move |_, (path, content): (String, Option<mlua::String>)| {
        let full = sb.resolve(&path).map_err(mlua::Error::external)?;
        sb.require(Permission::Write, &full)
            .map_err(mlua::Error::external)?;

        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(mlua::Error::external)?;
        }
        let bytes = content.map(|c| c.as_bytes().to_vec()).unwrap_or_default();
        std::fs::write(&full, bytes).map_err(mlua::Error::external)?;
        tracing::debug!(path = %full.display(), "script created file");
        Ok(())
    })?;
    fs.set("create", create)?;

    // fs.delete(path) - false when nothing was there
    let sb = sandbox.clone();
    let delete = lua.create_function(move |_, path: String| {
        let full = sb.resolve(&path).map_err(mlua::Error::external)?;
        sb.require(Permission::Write, &full)
            .map_err(mlua::Error::external)?;

        match std::fs::symlink_metadata(&full) {
            Ok(meta) if meta.is_dir() => Err(mlua::Error::external(SandboxViolation {
                kind: ViolationKind::DirectoryDelete,
                description: path,
                path: Some(full),
            })),
            Ok(_) => {
                std::fs::remove_file(&full).map_err(mlua::Error::external)?;
                tracing::debug!(path = %full.display(), "script deleted file");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(mlua::Error::external(e)),
        }
    })?;
    fs.set("delete", delete)?;

    // fs.exists(path)
    let sb = sandbox.clone();
    let exists = lua.create_function(move |_, path: String| {
        let full = sb.resolve(&path).map_err(mlua::Error::external)?;
        sb.require(Permission::Read, &full)
            .map_err(mlua::Error::external)?;
        Ok(full.exists())
    })?;
    fs.set("exists", exists)?;

    Ok(fs)
}

/// Create the `crew` namespace: version and logging.
pub fn create_crew_api(lua: &Lua, script: &str) -> mlua::Result<Table> {
    let crew = lua.create_table()?;
    crew.set("version", env!("CARGO_PKG_VERSION"))?;

    let name = script.to_string();
    let log_info = lua.create_function(move |_, msg: String| {
        tracing::info!(target: "crew_script", script = %name, "{}", msg);
        Ok(())
    })?;
    crew.set("log_info", log_info)?;

    let name = script.to_string();
    let log_warn = lua.create_function(move |_, msg: String| {
        tracing::warn!(target: "crew_script", script = %name, "{}", msg);
        Ok(())
    })?;
    crew.set("log_warn", log_warn)?;

    let name = script.to_string();
    let log_error = lua.create_function(move |_, msg: String| {
        tracing::error!(target: "crew_script", script = %name, "{}", msg);
        Ok(())
    })?;
    crew.set("log_error", log_error)?;

    Ok(crew)
}
