//! Output formatting utilities for the CLI
//!
//! Table rendering for the guest listing plus colored status lines for
//! command feedback.

use tabled::{settings::Style, Table, Tabled};

use pd_core::VirtualMachine;

/// Format the guest listing as an ASCII table.
///
/// The detailed view adds CPU, disk, guest address, and console
/// capability columns.
pub fn format_vms(vms: &[VirtualMachine], detailed: bool) -> String {
    if vms.is_empty() {
        return "No virtual machines found".to_string();
    }

    #[derive(Tabled)]
    struct VmRow {
        #[tabled(rename = "VMID")]
        vmid: u32,
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "NODE")]
        node: String,
        #[tabled(rename = "STATUS")]
        status: String,
        #[tabled(rename = "UPTIME")]
        uptime: String,
        #[tabled(rename = "MEMORY")]
        memory: String,
        #[tabled(rename = "TAGS")]
        tags: String,
    }

    #[derive(Tabled)]
    struct VmRowDetailed {
        #[tabled(rename = "VMID")]
        vmid: u32,
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "NODE")]
        node: String,
        #[tabled(rename = "STATUS")]
        status: String,
        #[tabled(rename = "UPTIME")]
        uptime: String,
        #[tabled(rename = "CPUS")]
        cpus: String,
        #[tabled(rename = "MEMORY")]
        memory: String,
        #[tabled(rename = "DISK")]
        disk: String,
        #[tabled(rename = "ADDRESS")]
        address: String,
        #[tabled(rename = "CONSOLE")]
        console: String,
    }

    if detailed {
        let rows: Vec<VmRowDetailed> = vms
            .iter()
            .map(|vm| VmRowDetailed {
                vmid: vm.vmid,
                name: truncate(&vm.name, 24),
                node: vm.node.clone(),
                status: vm.status.to_string(),
                uptime: vm.uptime.map(format_uptime).unwrap_or_else(|| "-".to_string()),
                cpus: vm
                    .cpus
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                memory: format_usage(vm.mem, vm.maxmem),
                disk: format_usage(vm.disk, vm.maxdisk),
                address: vm.guest_ip.clone().unwrap_or_else(|| "-".to_string()),
                console: if vm.console_capable { "spice" } else { "-" }.to_string(),
            })
            .collect();
        Table::new(rows).with(Style::sharp()).to_string()
    } else {
        let rows: Vec<VmRow> = vms
            .iter()
            .map(|vm| VmRow {
                vmid: vm.vmid,
                name: truncate(&vm.name, 24),
                node: vm.node.clone(),
                status: vm.status.to_string(),
                uptime: vm.uptime.map(format_uptime).unwrap_or_else(|| "-".to_string()),
                memory: format_usage(vm.mem, vm.maxmem),
                tags: vm.tags.join(";"),
            })
            .collect();
        Table::new(rows).with(Style::sharp()).to_string()
    }
}

/// Render a used/total byte pair ("1.5G/4.0G"), or "-" when unknown
fn format_usage(used: Option<u64>, max: Option<u64>) -> String {
    match (used, max) {
        (Some(used), Some(max)) => format!("{}/{}", format_bytes(used), format_bytes(max)),
        (None, Some(max)) => format_bytes(max),
        _ => "-".to_string(),
    }
}

/// Render a byte count with a binary-unit suffix
fn format_bytes(bytes: u64) -> String {
    const GIB: u64 = 1024 * 1024 * 1024;
    const MIB: u64 = 1024 * 1024;
    if bytes >= GIB {
        format!("{:.1}G", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.0}M", bytes as f64 / MIB as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// Render an uptime in the largest two useful units
fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Truncate a string with ellipsis if too long
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len.saturating_sub(3)])
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow with a warning symbol prefix
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
