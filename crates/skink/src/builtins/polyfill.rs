//! Guest-source polyfills, compiled and executed once at construction.
//!
//! Higher-order builtins (anything that must call back into guest
//! functions) are written in the guest language itself so the one step
//! engine executes them; the natives they wrap never re-enter the
//! evaluator. Their AST is parsed with positions stripped, keeping
//! polyfill frames invisible to location-based observers.

/// Every polyfill in one program, installed non-enumerably through
/// `Object.defineProperty`.
pub(crate) const POLYFILLS: &str = r#"
(function() {
  function hide(obj, name, value) {
    Object.defineProperty(obj, name,
        {configurable: true, enumerable: false, writable: true, value: value});
  }

  hide(Object, 'defineProperties', function defineProperties(obj, props) {
    var keys = Object.keys(props);
    for (var i = 0; i < keys.length; i++) {
      Object.defineProperty(obj, keys[i], props[keys[i]]);
    }
    return obj;
  });

  var nativeCreate = Object.create;
  hide(Object, 'create', function create(proto, props) {
    var obj = nativeCreate(proto);
    props !== undefined && Object.defineProperties(obj, props);
    return obj;
  });

  hide(Function.prototype, 'bind', function bind(oThis) {
    if (typeof this !== 'function') {
      throw new TypeError('Bind must be called on a function');
    }
    var aArgs = Array.prototype.slice.call(arguments, 1),
        fToBind = this,
        fNOP = function() {},
        fBound = function() {
          return fToBind.apply(
              this instanceof fNOP ? this : oThis,
              aArgs.concat(Array.prototype.slice.call(arguments)));
        };
    if (this.prototype) {
      fNOP.prototype = this.prototype;
    }
    fBound.prototype = new fNOP();
    return fBound;
  });

  hide(Array.prototype, 'every', function every(callbackfn, thisArg) {
    if (this == null || typeof callbackfn !== 'function') throw new TypeError();
    var t = Object(this), len = t.length >>> 0;
    for (var i = 0; i < len; i++) {
      if (i in t && !callbackfn.call(thisArg, t[i], i, t)) return false;
    }
    return true;
  });

  hide(Array.prototype, 'some', function some(callbackfn, thisArg) {
    if (this == null || typeof callbackfn !== 'function') throw new TypeError();
    var t = Object(this), len = t.length >>> 0;
    for (var i = 0; i < len; i++) {
      if (i in t && callbackfn.call(thisArg, t[i], i, t)) return true;
    }
    return false;
  });

  hide(Array.prototype, 'forEach', function forEach(callbackfn, thisArg) {
    if (this == null || typeof callbackfn !== 'function') throw new TypeError();
    var t = Object(this), len = t.length >>> 0;
    for (var i = 0; i < len; i++) {
      if (i in t) callbackfn.call(thisArg, t[i], i, t);
    }
  });

  hide(Array.prototype, 'map', function map(callbackfn, thisArg) {
    if (this == null || typeof callbackfn !== 'function') throw new TypeError();
    var t = Object(this), len = t.length >>> 0, out = new Array(len);
    for (var i = 0; i < len; i++) {
      if (i in t) out[i] = callbackfn.call(thisArg, t[i], i, t);
    }
    return out;
  });

  hide(Array.prototype, 'filter', function filter(callbackfn, thisArg) {
    if (this == null || typeof callbackfn !== 'function') throw new TypeError();
    var t = Object(this), len = t.length >>> 0, out = [];
    for (var i = 0; i < len; i++) {
      if (i in t) {
        var value = t[i];
        if (callbackfn.call(thisArg, value, i, t)) out.push(value);
      }
    }
    return out;
  });

  hide(Array.prototype, 'reduce', function reduce(callbackfn, initialValue) {
    if (this == null || typeof callbackfn !== 'function') throw new TypeError();
    var t = Object(this), len = t.length >>> 0, k = 0, value;
    if (arguments.length > 1) {
      value = initialValue;
    } else {
      while (k < len && !(k in t)) k++;
      if (k >= len) throw new TypeError('Reduce of empty array with no initial value');
      value = t[k++];
    }
    for (; k < len; k++) {
      if (k in t) value = callbackfn(value, t[k], k, t);
    }
    return value;
  });

  hide(Array.prototype, 'reduceRight', function reduceRight(callbackfn, initialValue) {
    if (this == null || typeof callbackfn !== 'function') throw new TypeError();
    var t = Object(this), len = t.length >>> 0, k = len - 1, value;
    if (arguments.length > 1) {
      value = initialValue;
    } else {
      while (k >= 0 && !(k in t)) k--;
      if (k < 0) throw new TypeError('Reduce of empty array with no initial value');
      value = t[k--];
    }
    for (; k >= 0; k--) {
      if (k in t) value = callbackfn(value, t[k], k, t);
    }
    return value;
  });

  var nativeSort = Array.prototype.sort;
  hide(Array.prototype, 'sort', function sort(comparefn) {
    if (typeof comparefn !== 'function') {
      return nativeSort.call(this);
    }
    var t = Object(this), len = t.length >>> 0;
    function order(a, b) {
      if (a === undefined) return b === undefined ? 0 : 1;
      if (b === undefined) return -1;
      return comparefn(a, b);
    }
    for (var i = 1; i < len; i++) {
      var value = t[i];
      for (var j = i - 1; j >= 0 && order(t[j], value) > 0; j--) {
        t[j + 1] = t[j];
      }
      t[j + 1] = value;
    }
    return t;
  });

  hide(Array.prototype, 'toLocaleString', function toLocaleString() {
    var t = Object(this), len = t.length >>> 0, out = [];
    for (var i = 0; i < len; i++) {
      out[i] = (t[i] === null || t[i] === undefined) ? '' : t[i].toLocaleString();
    }
    return out.join(',');
  });

  var nativeReplace = String.prototype.replace;
  hide(String.prototype, 'replace', function replace(substr, newSubstr) {
    if (typeof newSubstr !== 'function') {
      return nativeReplace.call(this, substr, newSubstr);
    }
    var str = String(this);
    if (!(substr instanceof RegExp)) {
      var needle = String(substr);
      var at = str.indexOf(needle);
      if (at === -1) return str;
      return str.substring(0, at) + String(newSubstr(needle, at, str)) +
          str.substring(at + needle.length);
    }
    var m;
    if (!substr.global) {
      m = substr.exec(str);
      if (m === null) return str;
      return str.substring(0, m.index) +
          String(newSubstr.apply(undefined, m.concat([m.index, str]))) +
          str.substring(m.index + m[0].length);
    }
    substr.lastIndex = 0;
    var out = '', lastEnd = 0;
    while ((m = substr.exec(str)) !== null) {
      out += str.substring(lastEnd, m.index) +
          String(newSubstr.apply(undefined, m.concat([m.index, str])));
      lastEnd = m.index + m[0].length;
      if (m[0].length === 0) substr.lastIndex++;
    }
    return out + str.substring(lastEnd);
  });
})();
"#;
