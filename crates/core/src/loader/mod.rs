use std::path::PathBuf;

use libloading::Library;

use crate::{DynError, NativeLoader};

/// Maps a bare module name to the platform's shared-library file name,
/// e.g. `SDL2` to `libSDL2.so`, `SDL2.dll`, or `libSDL2.dylib`.
pub fn platform_library_filename(name: &str) -> String {
    match std::env::consts::OS {
        "windows" => format!("{name}.dll"),
        "macos" | "ios" => format!("lib{name}.dylib"),
        _ => format!("lib{name}.so"),
    }
}

/// [`NativeLoader`] backed by the operating system's dynamic linker.
///
/// Every successfully opened handle stays resident for the life of the
/// loader so symbols already handed out remain valid. Teardown releases the
/// handles in reverse load order, since later modules may reference symbols
/// from earlier ones.
pub struct DynamicLibraryLoader {
    search_dir: Option<PathBuf>,
    handles: Vec<Library>,
}

impl DynamicLibraryLoader {
    /// Resolves libraries through the platform's default search path.
    pub fn new() -> Self {
        Self {
            search_dir: None,
            handles: Vec::new(),
        }
    }

    /// Resolves libraries inside `dir` instead of the default search path.
    pub fn with_search_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            search_dir: Some(dir.into()),
            handles: Vec::new(),
        }
    }

    /// Number of modules currently held resident.
    pub fn resident(&self) -> usize {
        self.handles.len()
    }
}

impl Default for DynamicLibraryLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeLoader for DynamicLibraryLoader {
    fn load(&mut self, name: &str) -> std::result::Result<(), DynError> {
        let file = platform_library_filename(name);
        // A bare file name defers to the platform's library search path.
        let path = match &self.search_dir {
            Some(dir) => dir.join(&file),
            None => PathBuf::from(&file),
        };

        // SAFETY: opening a shared library runs its initialisers. The chain
        // only names modules the product ships, the same trust as linking
        // against them at build time.
        let library = unsafe { Library::new(&path) }?;
        self.handles.push(library);
        Ok(())
    }
}

impl Drop for DynamicLibraryLoader {
    fn drop(&mut self) {
        // Release in reverse load order.
        while let Some(handle) = self.handles.pop() {
            drop(handle);
        }
    }
}

impl std::fmt::Debug for DynamicLibraryLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicLibraryLoader")
            .field("search_dir", &self.search_dir)
            .field("resident", &self.handles.len())
            .finish()
    }
}
