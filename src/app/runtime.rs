use crate::events::{IconRequest, IconResult, UserEvent};
use crate::hotkey::Hotkey;
use crate::icon_gen::IconPipeline;
use eframe::egui;
use log::info;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

#[cfg(target_os = "windows")]
use crate::branding::APP_DISPLAY_NAME;
#[cfg(target_os = "windows")]
use crossbeam_channel::TryRecvError;
#[cfg(target_os = "windows")]
use log::error;
#[cfg(target_os = "windows")]
use std::time::Duration;
#[cfg(target_os = "windows")]
use tray_icon::{
    menu::{Menu, MenuEvent, MenuItem},
    MouseButton, MouseButtonState, TrayIcon, TrayIconBuilder, TrayIconEvent,
};
#[cfg(target_os = "windows")]
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_APARTMENTTHREADED};
#[cfg(target_os = "windows")]
use windows::Win32::UI::Input::KeyboardAndMouse::{RegisterHotKey, UnregisterHotKey};
#[cfg(target_os = "windows")]
use windows::Win32::UI::WindowsAndMessaging::{
    GetMessageW, PeekMessageW, MSG, PM_NOREMOVE, WM_HOTKEY,
};

#[cfg(target_os = "windows")]
const HOTKEY_ID_TOGGLE: i32 = 1001;

#[cfg(target_os = "windows")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeAction {
    Show,
    Hide,
    Toggle,
    Quit,
}

#[cfg(target_os = "windows")]
pub struct TrayHandles {
    pub tray_icon: TrayIcon,
    pub toggle_item: MenuItem,
}

pub struct RuntimeHandles {
    pub rx: Receiver<UserEvent>,
    pub icon_req_tx: Sender<IconRequest>,
    #[cfg(target_os = "windows")]
    pub tray: Option<TrayHandles>,
    /// In-window requests go through the runtime loop so it tracks the same
    /// visibility as the tray and global hotkey.
    #[cfg(target_os = "windows")]
    pub action_tx: Sender<RuntimeAction>,
}

pub fn build_runtime(ctx: &egui::Context, toggle: Option<Hotkey>) -> RuntimeHandles {
    let (icon_req_tx, icon_req_rx) = mpsc::channel::<IconRequest>();
    let (ui_tx, ui_rx) = mpsc::channel::<UserEvent>();

    spawn_icon_worker(icon_req_rx, ui_tx.clone(), ctx.clone());

    #[cfg(target_os = "windows")]
    {
        let (action_tx, action_rx) = mpsc::channel::<RuntimeAction>();
        let tray = build_tray();
        if let Some(hotkey) = toggle {
            spawn_native_hotkey_worker(hotkey, action_tx.clone());
        }
        let (toggle_id, quit_id) = match &tray {
            Some(handles) => (
                Some(handles.toggle_item.id().clone()),
                handles.quit_id.clone(),
            ),
            None => (None, None),
        };
        spawn_runtime_event_loop(ui_tx, action_rx, ctx.clone(), toggle_id, quit_id);

        RuntimeHandles {
            rx: ui_rx,
            icon_req_tx,
            tray: tray.map(|t| t.handles),
            action_tx,
        }
    }

    #[cfg(not(target_os = "windows"))]
    {
        drop(ui_tx);
        if let Some(hotkey) = toggle {
            info!("global hotkey {hotkey} only works while the window has focus on this platform");
        }
        RuntimeHandles {
            rx: ui_rx,
            icon_req_tx,
        }
    }
}

fn spawn_icon_worker(icon_req_rx: Receiver<IconRequest>, tx: Sender<UserEvent>, ctx: egui::Context) {
    thread::spawn(move || {
        #[cfg(target_os = "windows")]
        let com_initialized = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED).is_ok() };

        let pipeline = IconPipeline::standard();
        while let Ok(req) = icon_req_rx.recv() {
            let candidates = pipeline.run(&req.request);
            let _ = tx.send(UserEvent::IconsGenerated(IconResult {
                ticket: req.ticket,
                cell: req.request.cell,
                candidates,
            }));
            ctx.request_repaint();
        }
        info!("icon worker stopped");

        #[cfg(target_os = "windows")]
        if com_initialized {
            unsafe { CoUninitialize() };
        }
    });
}

#[cfg(target_os = "windows")]
struct BuiltTray {
    handles: TrayHandles,
    quit_id: Option<tray_icon::menu::MenuId>,
}

#[cfg(target_os = "windows")]
fn build_tray() -> Option<BuiltTray> {
    let icon = crate::icons::generate_colored_icon([45, 190, 150, 255])?;

    let tray_menu = Menu::new();
    let toggle_item = MenuItem::new("Hide", true, None);
    let quit_item = MenuItem::new("Quit", true, None);
    if let Err(err) = tray_menu.append_items(&[&toggle_item, &quit_item]) {
        error!("failed to build tray menu: {err}");
        return None;
    }

    let tray_icon = match TrayIconBuilder::new()
        .with_menu(Box::new(tray_menu))
        .with_tooltip(APP_DISPLAY_NAME)
        .with_icon(icon)
        .build()
    {
        Ok(tray_icon) => tray_icon,
        Err(err) => {
            error!("failed to create tray icon: {err}");
            return None;
        }
    };

    Some(BuiltTray {
        quit_id: Some(quit_item.id().clone()),
        handles: TrayHandles {
            tray_icon,
            toggle_item,
        },
    })
}

#[cfg(target_os = "windows")]
fn spawn_native_hotkey_worker(hotkey: Hotkey, action_tx: Sender<RuntimeAction>) {
    thread::spawn(move || unsafe {
        let mut init_msg = MSG::default();
        let _ = PeekMessageW(&mut init_msg, None, 0, 0, PM_NOREMOVE);

        if let Err(err) = RegisterHotKey(
            None,
            HOTKEY_ID_TOGGLE,
            hotkey.win32_modifiers(),
            hotkey.virtual_key(),
        ) {
            error!("failed to register global hotkey {hotkey}: {err}");
            return;
        }
        info!("registered global hotkey {hotkey}");

        let mut msg = MSG::default();
        loop {
            let status = GetMessageW(&mut msg, None, 0, 0).0;
            if status == -1 {
                error!("GetMessageW failed in hotkey worker");
                break;
            }
            if status == 0 {
                break;
            }
            if msg.message == WM_HOTKEY && msg.wParam.0 as i32 == HOTKEY_ID_TOGGLE {
                let _ = action_tx.send(RuntimeAction::Toggle);
            }
        }

        let _ = UnregisterHotKey(None, HOTKEY_ID_TOGGLE);
    });
}

#[cfg(target_os = "windows")]
fn spawn_runtime_event_loop(
    ui_tx: Sender<UserEvent>,
    action_rx: Receiver<RuntimeAction>,
    ctx: egui::Context,
    toggle_menu_id: Option<tray_icon::menu::MenuId>,
    quit_menu_id: Option<tray_icon::menu::MenuId>,
) {
    thread::spawn(move || {
        let mut is_visible = true;
        loop {
            while let Ok(action) = action_rx.try_recv() {
                apply_runtime_action(action, &ui_tx, &ctx, &mut is_visible);
            }

            match MenuEvent::receiver().try_recv() {
                Ok(event) => {
                    if Some(&event.id) == toggle_menu_id.as_ref() {
                        apply_runtime_action(RuntimeAction::Toggle, &ui_tx, &ctx, &mut is_visible);
                    } else if Some(&event.id) == quit_menu_id.as_ref() {
                        apply_runtime_action(RuntimeAction::Quit, &ui_tx, &ctx, &mut is_visible);
                    }
                }
                Err(err) => {
                    if !matches!(err, TryRecvError::Empty) {
                        error!("menu receiver error: {}", err);
                    }
                }
            }

            match TrayIconEvent::receiver().try_recv() {
                Ok(event) => {
                    if let TrayIconEvent::Click {
                        button: MouseButton::Left,
                        button_state: MouseButtonState::Up,
                        ..
                    } = event
                    {
                        apply_runtime_action(RuntimeAction::Toggle, &ui_tx, &ctx, &mut is_visible);
                    }
                }
                Err(err) => {
                    if !matches!(err, TryRecvError::Empty) {
                        error!("tray receiver error: {}", err);
                    }
                }
            }

            thread::sleep(Duration::from_millis(10));
        }
    });
}

#[cfg(target_os = "windows")]
fn apply_runtime_action(
    action: RuntimeAction,
    ui_tx: &Sender<UserEvent>,
    ctx: &egui::Context,
    is_visible: &mut bool,
) {
    match action {
        RuntimeAction::Show => {
            *is_visible = true;
            ctx.send_viewport_cmd(egui::ViewportCommand::Visible(true));
            ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(false));
            ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
            let _ = ui_tx.send(UserEvent::Show);
            ctx.request_repaint();
        }
        RuntimeAction::Hide => {
            if *is_visible {
                *is_visible = false;
                ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(true));
                let _ = ui_tx.send(UserEvent::Hide);
                ctx.request_repaint();
            }
        }
        RuntimeAction::Toggle => {
            if *is_visible {
                apply_runtime_action(RuntimeAction::Hide, ui_tx, ctx, is_visible);
            } else {
                apply_runtime_action(RuntimeAction::Show, ui_tx, ctx, is_visible);
            }
        }
        RuntimeAction::Quit => {
            let _ = ui_tx.send(UserEvent::Quit);
            ctx.request_repaint();
        }
    }
}
