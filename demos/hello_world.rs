use std::io::Read;

use mockfs_kit::{
    FileMode, FileSystem, InjectedError, OsFileSystem, VirtualFile, VirtualFileSystem,
};

// Production-style code: knows nothing about which filesystem it gets.
fn greeting(fs: &mut dyn FileSystem, dir: &str) -> mockfs_kit::Result<String> {
    let mut content = String::new();
    fs.open(&format!("{dir}/greeting.txt"))?
        .read_to_string(&mut content)
        .map_err(|e| mockfs_kit::FsError::from_io(dir, e))?;

    fs.mkdir_all(&format!("{dir}/cache/greetings"), FileMode::perm(0o755))?;
    Ok(content)
}

fn main() {
    // builds the tree in memory; parents are created as needed
    let mut fs = VirtualFileSystem::new([
        ("/app/current", VirtualFile::symlink("releases/v2")),
        ("/app/releases/v2/greeting.txt", VirtualFile::file("Hello, World!")),
        ("/app/releases/v1/greeting.txt", VirtualFile::file("Hi")),
    ])
    .unwrap();

    // `current` is followed to `releases/v2`
    println!("{}", greeting(&mut fs, "/app/current").unwrap());
    println!("{}", fs.eval_symlinks("/app/current/cache").unwrap());

    // relative paths are joined to the cwd prefix
    fs.set_cwd("/app/releases").unwrap();
    assert!(fs.stat("v1/greeting.txt").unwrap().is_file());

    // every call that walks through `v1` now fails with the injected error
    let fault = InjectedError::new("disk unplugged");
    fs.set("/app/releases/v1", VirtualFile::dir().with_error(fault.clone()))
        .unwrap();
    let err = greeting(&mut fs, "/app/releases/v1").unwrap_err();
    assert!(err.injected().unwrap().ptr_eq(&fault));
    println!("injected: {err}");

    // the same function against the host
    let tmp = std::env::temp_dir().join("mockfs_hello");
    std::fs::create_dir_all(&tmp).unwrap();
    std::fs::write(tmp.join("greeting.txt"), "Hello from the host").unwrap();
    let mut os = OsFileSystem::new();
    println!("{}", greeting(&mut os, &tmp.to_string_lossy()).unwrap());
    std::fs::remove_dir_all(&tmp).unwrap();
}
