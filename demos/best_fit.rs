use std::{io::Read, ptr};

use bestfit::HEADER_SIZE;
use libc::sbrk;

/// Waits until the user presses ENTER.
/// Gives time to inspect the process with `pmap` or `gdb` between steps.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn print_stats() {
  let stats = bestfit::stats();
  println!(
    "    blocks = {}, free = {}, payload = {} bytes, heap = {} bytes",
    stats.blocks,
    stats.free_blocks,
    stats.payload_bytes,
    stats.heap_bytes()
  );
}

fn main() {
  println!("header size = {HEADER_SIZE} bytes");

  unsafe {
    print_program_break("start");
    block_until_enter_pressed();

    // 1) Two blocks of different sizes. Each one grows the heap.
    let twenty = bestfit::allocate(20);
    let ten = bestfit::allocate(10);
    let pin = bestfit::allocate(1);
    println!("\n[1] allocate 20 -> {twenty:?}, 10 -> {ten:?}, 1 -> {pin:?}");
    print_program_break("after growth");
    print_stats();
    block_until_enter_pressed();

    // 2) Free both. Nothing goes back to the OS, the blocks are only marked.
    bestfit::release(twenty);
    bestfit::release(ten);
    println!("\n[2] released the 20 and 10 byte blocks");
    print_stats();
    block_until_enter_pressed();

    // 3) An 8 byte request takes the smallest block that fits.
    let eight = bestfit::allocate(8);
    println!(
      "\n[3] allocate 8 -> {eight:?} ({})",
      if eight == ten {
        "best fit: reused the 10 byte block"
      } else {
        "did not reuse the 10 byte block"
      }
    );
    print_stats();
    block_until_enter_pressed();

    // 4) 30 bytes would fit 20 + 10 merged, but blocks are never merged.
    let thirty = bestfit::zero_allocate(3, 10);
    println!("\n[4] zero_allocate 3 x 10 -> {thirty:?}");
    print_program_break("after no-coalesce growth");
    print_stats();

    let bytes = ptr::slice_from_raw_parts(thirty, 30);
    println!("[4] all zero? {}", (*bytes).iter().all(|&b| b == 0));
    block_until_enter_pressed();

    println!("\n[5] End of example. Process will exit and the OS will reclaim all memory.");
  }
}
