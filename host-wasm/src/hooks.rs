use crate::value::HostValue;

/// Ambient host capabilities the import surface forwards to.
///
/// Implemented by the embedder over whatever scheduling and console
/// facilities the host environment actually has. `Err` results are host
/// throws: the import surface routes them through the guarded call boundary
/// so they reach the module as a failure sentinel plus an exception-slot
/// entry, never as an unwinding error.
///
/// Callback values registered here are shared with the handle table
/// (reference-counted), so a registration stays valid even after the module
/// drops its own handle to the callback.
pub trait HostHooks {
  /// Monotonic-ish current time in milliseconds.
  fn now(&mut self) -> f64;

  fn console_log(&mut self, text: &str) {
    let _ = text;
  }

  fn console_error(&mut self, text: &str) {
    let _ = text;
  }

  /// Schedules `callback` to run once after `delay_ms`. Returns the timer
  /// id used for cancellation.
  fn set_timeout(&mut self, callback: HostValue, delay_ms: f64) -> Result<i32, HostValue> {
    let _ = (callback, delay_ms);
    Err(HostValue::error("setTimeout is not supported by this host"))
  }

  /// Withdraws a scheduled timer. Cancelling an unknown or already-fired id
  /// is a no-op.
  fn clear_timeout(&mut self, id: i32) {
    let _ = id;
  }

  /// Schedules `callback` for the next repaint. Returns the request id used
  /// for cancellation.
  fn request_animation_frame(&mut self, callback: HostValue) -> Result<i32, HostValue> {
    let _ = callback;
    Err(HostValue::error(
      "requestAnimationFrame is not supported by this host",
    ))
  }

  fn cancel_animation_frame(&mut self, id: i32) -> Result<(), HostValue> {
    let _ = id;
    Ok(())
  }
}
