mod fixture;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use fixture::{RecordingHooks, ScriptedGuest};
use host_wasm::{
  imports, invoke_callback, Bridge, BridgeError, GuestExports, Handle, HostValue, PlatformObject,
};

/// A platform object standing in for a canvas-like host resource.
struct FakeCanvas {
  width: Cell<f64>,
  drawn: RefCell<Vec<Vec<u8>>>,
  mixed: RefCell<Vec<Vec<f64>>>,
}

impl FakeCanvas {
  fn new() -> Self {
    Self {
      width: Cell::new(300.0),
      drawn: RefCell::new(Vec::new()),
      mixed: RefCell::new(Vec::new()),
    }
  }
}

impl PlatformObject for FakeCanvas {
  fn type_name(&self) -> &str {
    "HTMLCanvasElement"
  }

  fn property(&self, name: &str) -> Option<HostValue> {
    match name {
      "width" => Some(HostValue::Number(self.width.get())),
      "title" => Some(HostValue::string("main canvas")),
      _ => None,
    }
  }

  fn set_property(&self, name: &str, value: HostValue) -> Result<(), HostValue> {
    match (name, value) {
      ("width", HostValue::Number(n)) => {
        self.width.set(n);
        Ok(())
      }
      _ => Err(HostValue::error(&format!("cannot set '{name}'"))),
    }
  }

  fn call(&self, method: &str, args: &[HostValue]) -> Result<HostValue, HostValue> {
    match method {
      "reset" => {
        self.width.set(0.0);
        Ok(HostValue::Undefined)
      }
      "scaled" => match args {
        [HostValue::Number(factor)] => Ok(HostValue::Number(self.width.get() * factor)),
        _ => Err(HostValue::error("scaled expects a number")),
      },
      "draw" => match args {
        [HostValue::Bytes(bytes)] => {
          self.drawn.borrow_mut().push(bytes.to_vec());
          Ok(HostValue::Undefined)
        }
        _ => Err(HostValue::error("draw expects bytes")),
      },
      "mix" => match args {
        [HostValue::Array(values)] => {
          let samples = values.iter().filter_map(|v| v.as_number()).collect();
          self.mixed.borrow_mut().push(samples);
          Ok(HostValue::Undefined)
        }
        _ => Err(HostValue::error("mix expects a sequence")),
      },
      "explode" => Err(HostValue::error("canvas exploded")),
      _ => Err(HostValue::error(&format!("{method} is not a function"))),
    }
  }
}

fn write_name(
  bridge: &mut Bridge,
  guest: &mut ScriptedGuest,
  name: &str,
) -> Result<(u32, u32), BridgeError> {
  let ptr = guest.alloc(name.len() as u32)?;
  bridge.byte_view(guest.memory()).write(ptr, name.as_bytes())?;
  Ok((ptr, name.len() as u32))
}

#[test]
fn string_new_and_debug_text_roundtrip() -> Result<(), BridgeError> {
  let mut bridge = Bridge::new();
  let mut guest = ScriptedGuest::new();

  let ret = guest.alloc(8)?;
  let (ptr, len) = write_name(&mut bridge, &mut guest, "hi")?;
  let handle = imports::string_new(&mut bridge, &guest, ptr, len)?;

  imports::debug_text(&mut bridge, &mut guest, ret, handle.index())?;

  let i32s = bridge.i32_view(guest.memory());
  let text_ptr = i32s.load(ret / 4)? as u32;
  let text_len = i32s.load(ret / 4 + 1)? as u32;
  let view = bridge.byte_view(guest.memory());
  assert_eq!(&*view.read(text_ptr, text_len)?, b"\"hi\"");
  Ok(())
}

#[test]
fn clone_ref_aliases_and_drop_ref_releases() -> Result<(), BridgeError> {
  let mut bridge = Bridge::new();

  let canvas: Rc<dyn PlatformObject> = Rc::new(FakeCanvas::new());
  let first = bridge.alloc(HostValue::Platform(canvas));
  let second = imports::object_clone_ref(&mut bridge, first.index())?;
  assert_ne!(first, second);

  let a = bridge.value(first)?.clone();
  let b = bridge.value(second)?.clone();
  assert!(a.same_value(&b));

  imports::object_drop_ref(&mut bridge, first.index())?;
  assert!(bridge.value(first).is_err());
  assert!(bridge.value(second).is_ok());
  Ok(())
}

#[test]
fn primitive_extraction_imports() -> Result<(), BridgeError> {
  let mut bridge = Bridge::new();
  let mut guest = ScriptedGuest::new();

  assert!(imports::is_undefined(&bridge, Handle::UNDEFINED.index())?);
  assert!(!imports::is_undefined(&bridge, Handle::NULL.index())?);

  assert_eq!(imports::boolean_get(&bridge, Handle::TRUE.index())?, 1);
  assert_eq!(imports::boolean_get(&bridge, Handle::FALSE.index())?, 0);
  let number = bridge.alloc(HostValue::Number(8.0));
  assert_eq!(imports::boolean_get(&bridge, number.index())?, 2);

  let ret = guest.alloc(16)?;
  imports::number_get(&mut bridge, &mut guest, ret, number.index())?;
  assert_eq!(bridge.i32_view(guest.memory()).load(ret / 4)?, 1);
  assert_eq!(bridge.f64_view(guest.memory()).load(ret / 8 + 1)?, 8.0);

  let text = bridge.alloc(HostValue::string("not a number"));
  imports::number_get(&mut bridge, &mut guest, ret, text.index())?;
  assert_eq!(bridge.i32_view(guest.memory()).load(ret / 4)?, 0);

  let other = bridge.alloc(HostValue::Number(8.0));
  assert!(imports::is_same_value(&bridge, number.index(), other.index())?);
  assert!(!imports::is_same_value(&bridge, number.index(), text.index())?);
  Ok(())
}

#[test]
fn console_imports_render_and_forward() -> Result<(), BridgeError> {
  let mut bridge = Bridge::new();
  let mut guest = ScriptedGuest::new();
  let mut hooks = RecordingHooks::new();

  let value = bridge.alloc(HostValue::Number(7.5));
  imports::console_log(&bridge, &mut hooks, value.index())?;
  assert_eq!(hooks.log, vec!["7.5"]);

  let error = bridge.alloc(HostValue::error("broken"));
  imports::console_error(&bridge, &mut hooks, error.index())?;
  assert_eq!(hooks.errors, vec!["Error: broken\nError: broken"]);

  // The string-variant error path frees the guest buffer it consumed.
  let (ptr, len) = write_name(&mut bridge, &mut guest, "oops")?;
  imports::console_error_str(&mut bridge, &mut guest, &mut hooks, ptr, len)?;
  assert_eq!(hooks.errors[1], "oops");
  assert_eq!(guest.freed, vec![(ptr, len)]);
  Ok(())
}

#[test]
fn clock_import_forwards_to_the_host() {
  let mut hooks = RecordingHooks::new();
  assert_eq!(imports::now(&mut hooks), 16.0);
  assert_eq!(imports::now(&mut hooks), 32.0);
}

#[test]
fn timer_registration_shares_callback_ownership() -> Result<(), BridgeError> {
  let mut bridge = Bridge::new();
  let mut guest = ScriptedGuest::new();
  let mut hooks = RecordingHooks::new();

  let callback = imports::closure_wrapper0(&mut bridge, 7, 9, 3, 1);
  let id = imports::set_timeout(&mut bridge, &mut hooks, callback.index(), 250.0)?;
  assert_eq!(hooks.timers.len(), 1);
  assert_eq!(hooks.timers[0].0, id);
  assert_eq!(hooks.timers[0].1, 250.0);

  // The host fires the timer through its own clone of the callback.
  let scheduled = hooks.timers[0].2.clone();
  let HostValue::Callback(cb) = scheduled else {
    panic!("a callback value was registered");
  };
  invoke_callback(&mut bridge, &mut guest, &cb, &[])?;
  assert_eq!(guest.invocations.len(), 1);

  // Cancellation then drop, in either order, stays safe.
  imports::clear_timeout(&mut hooks, id);
  assert_eq!(hooks.cancelled_timers, vec![id]);
  assert!(imports::callback_drop(&mut bridge, callback.index())?);
  Ok(())
}

#[test]
fn animation_frame_requests_are_guarded() -> Result<(), BridgeError> {
  let mut bridge = Bridge::new();
  let mut hooks = RecordingHooks::new();

  let callback = imports::closure_wrapper0(&mut bridge, 1, 2, 3, 4);
  let id = imports::request_animation_frame(&mut bridge, &mut hooks, callback.index())?;
  assert_eq!(hooks.frames.len(), 1);
  imports::cancel_animation_frame(&mut bridge, &mut hooks, id)?;
  assert_eq!(hooks.cancelled_frames, vec![id]);

  hooks.fail_scheduling = Some("document hidden");
  let failed = imports::request_animation_frame(&mut bridge, &mut hooks, callback.index())?;
  assert_eq!(failed, 0);
  assert!(bridge.pending_exception().is_some());
  Ok(())
}

#[test]
fn property_reads_use_the_optional_handle_convention() -> Result<(), BridgeError> {
  let mut bridge = Bridge::new();
  let mut guest = ScriptedGuest::new();

  let canvas = bridge.alloc(HostValue::Platform(Rc::new(FakeCanvas::new())));

  let (ptr, len) = write_name(&mut bridge, &mut guest, "width")?;
  let width = imports::get_property(&mut bridge, &guest, canvas.index(), ptr, len)?;
  assert!(bridge.value(width)?.same_value(&HostValue::Number(300.0)));

  let (ptr, len) = write_name(&mut bridge, &mut guest, "missing")?;
  let absent = imports::get_property(&mut bridge, &guest, canvas.index(), ptr, len)?;
  assert_eq!(absent, Handle::NONE);
  Ok(())
}

#[test]
fn string_property_reads_use_the_return_pair_convention() -> Result<(), BridgeError> {
  let mut bridge = Bridge::new();
  let mut guest = ScriptedGuest::new();

  let canvas = bridge.alloc(HostValue::Platform(Rc::new(FakeCanvas::new())));
  let ret = guest.alloc(8)?;

  let (ptr, len) = write_name(&mut bridge, &mut guest, "title")?;
  imports::get_property_text(&mut bridge, &mut guest, ret, canvas.index(), ptr, len)?;
  let i32s = bridge.i32_view(guest.memory());
  let text_ptr = i32s.load(ret / 4)? as u32;
  let text_len = i32s.load(ret / 4 + 1)? as u32;
  let view = bridge.byte_view(guest.memory());
  assert_eq!(&*view.read(text_ptr, text_len)?, b"main canvas");

  // Absent string properties write a zero pointer.
  let (ptr, len) = write_name(&mut bridge, &mut guest, "missing")?;
  imports::get_property_text(&mut bridge, &mut guest, ret, canvas.index(), ptr, len)?;
  assert_eq!(bridge.i32_view(guest.memory()).load(ret / 4)?, 0);
  Ok(())
}

#[test]
fn property_writes_and_method_calls_are_guarded() -> Result<(), BridgeError> {
  let mut bridge = Bridge::new();
  let mut guest = ScriptedGuest::new();

  let canvas_obj = Rc::new(FakeCanvas::new());
  let canvas = bridge.alloc(HostValue::Platform(canvas_obj.clone()));

  let (ptr, len) = write_name(&mut bridge, &mut guest, "width")?;
  let new_width = bridge.alloc(HostValue::Number(512.0));
  imports::set_property(&mut bridge, &guest, canvas.index(), ptr, len, new_width.index())?;
  assert_eq!(canvas_obj.width.get(), 512.0);

  // A rejected write is captured, not propagated.
  let (ptr, len) = write_name(&mut bridge, &mut guest, "height")?;
  imports::set_property(&mut bridge, &guest, canvas.index(), ptr, len, new_width.index())?;
  assert!(bridge.pending_exception().is_some());
  bridge.take_exception();

  let (ptr, len) = write_name(&mut bridge, &mut guest, "scaled")?;
  let factor = bridge.alloc(HostValue::Number(2.0));
  let scaled =
    imports::call_method1(&mut bridge, &guest, canvas.index(), ptr, len, factor.index())?;
  assert!(bridge.value(scaled)?.same_value(&HostValue::Number(1024.0)));

  let (ptr, len) = write_name(&mut bridge, &mut guest, "reset")?;
  let result = imports::call_method0(&mut bridge, &guest, canvas.index(), ptr, len)?;
  assert_eq!(result, Handle::NONE);
  assert_eq!(canvas_obj.width.get(), 0.0);

  // A throwing method produces the sentinel plus a slot entry.
  let (ptr, len) = write_name(&mut bridge, &mut guest, "explode")?;
  let failed = imports::call_method0(&mut bridge, &guest, canvas.index(), ptr, len)?;
  assert_eq!(failed, Handle::NONE);
  assert!(bridge.pending_exception().is_some());
  Ok(())
}

#[test]
fn bulk_data_shapes_copy_out_of_the_current_views() -> Result<(), BridgeError> {
  let mut bridge = Bridge::new();
  let mut guest = ScriptedGuest::new();

  let canvas_obj = Rc::new(FakeCanvas::new());
  let canvas = bridge.alloc(HostValue::Platform(canvas_obj.clone()));

  let data = guest.alloc(4)?;
  bridge.byte_view(guest.memory()).write(data, &[9, 8, 7, 6])?;
  let (ptr, len) = write_name(&mut bridge, &mut guest, "draw")?;
  imports::call_method_bytes(&mut bridge, &guest, canvas.index(), ptr, len, data, 4)?;
  assert_eq!(*canvas_obj.drawn.borrow(), vec![vec![9, 8, 7, 6]]);

  let samples = guest.alloc(8)?;
  let f32s = bridge.f32_view(guest.memory());
  f32s.store(samples / 4, 0.5)?;
  f32s.store(samples / 4 + 1, -1.5)?;
  let (ptr, len) = write_name(&mut bridge, &mut guest, "mix")?;
  imports::call_method_f32s(&mut bridge, &guest, canvas.index(), ptr, len, samples, 2)?;
  assert_eq!(*canvas_obj.mixed.borrow(), vec![vec![0.5, -1.5]]);
  Ok(())
}

#[test]
fn instance_checks_compare_platform_type_tags() -> Result<(), BridgeError> {
  let mut bridge = Bridge::new();
  let mut guest = ScriptedGuest::new();

  let canvas = bridge.alloc(HostValue::Platform(Rc::new(FakeCanvas::new())));
  let number = bridge.alloc(HostValue::Number(3.0));

  let (ptr, len) = write_name(&mut bridge, &mut guest, "HTMLCanvasElement")?;
  assert!(imports::instance_of(&mut bridge, &guest, canvas.index(), ptr, len)?);
  assert!(!imports::instance_of(&mut bridge, &guest, number.index(), ptr, len)?);

  let (ptr, len) = write_name(&mut bridge, &mut guest, "Window")?;
  assert!(!imports::instance_of(&mut bridge, &guest, canvas.index(), ptr, len)?);
  Ok(())
}

#[test]
fn non_platform_handles_are_rejected_by_platform_imports() -> Result<(), BridgeError> {
  let mut bridge = Bridge::new();
  let mut guest = ScriptedGuest::new();

  let number = bridge.alloc(HostValue::Number(1.0));
  let (ptr, len) = write_name(&mut bridge, &mut guest, "width")?;
  assert!(matches!(
    imports::get_property(&mut bridge, &guest, number.index(), ptr, len),
    Err(BridgeError::TypeError(_))
  ));
  Ok(())
}
