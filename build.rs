use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=assets/app.ico");

    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }

    let icon_path = "assets/app.ico";
    if !Path::new(icon_path).is_file() {
        println!("cargo:warning=No icon found at {icon_path}; exe icon resource not set");
        return;
    }

    let mut res = winres::WindowsResource::new();
    res.set_icon(icon_path);
    res.set("ProductName", "Desk Grid");
    res.set("FileDescription", "Desk Grid desktop overlay");
    res.set("OriginalFilename", "desk_grid.exe");
    res.set("InternalName", "desk_grid");
    if let Err(err) = res.compile() {
        panic!("failed to compile Windows resource icon from {icon_path}: {err}");
    }
}
